//! Atomic batch import
//!
//! A batch is applied to a clone of the live repository. Every row is
//! attempted so the caller sees all failures at once; if any row fails the
//! clone is discarded and nothing is published.

use crate::audit::{AuditAction, AuditRecord};
use crate::error::{RepositoryError, Result};
use crate::events::{ChangeCause, ChangeSummary};
use crate::graph::GraphRepository;
use crate::handle::RepositoryHandle;
use crate::snapshot::{ObjectRecord, RelationshipRecord};
use archgraph_model::{
    canonical::semantically_equal, strip_bookkeeping, EdgeSpec, ErrorCode, NodeSpec, Stamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rows submitted by an importer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchImport {
    /// Nodes
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    /// Edges
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

impl BatchImport {
    /// Parse a batch document
    ///
    /// # Errors
    /// Malformed JSON.
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len() + self.relationships.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handling of ids that already exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Existing ids are `DuplicateId` errors
    #[default]
    CreateOnly,
    /// Existing ids are replaced; identical rows are skipped
    Upsert,
}

/// Batch section a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSection {
    /// `objects`
    Objects,
    /// `relationships`
    Relationships,
}

impl fmt::Display for BatchSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Objects => f.write_str("objects"),
            Self::Relationships => f.write_str("relationships"),
        }
    }
}

/// Failure of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Section
    pub section: BatchSection,
    /// Zero-based row index within the section
    pub row: usize,
    /// Row id, when supplied
    pub id: Option<String>,
    /// Cause
    pub error: RepositoryError,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.section, self.row)?;
        if let Some(id) = &self.id {
            write!(f, " ({id})")?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Failure of a whole batch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// At least one row failed; nothing was applied
    #[error("batch rejected: {} row error(s)", rows.len())]
    Rejected {
        /// Every failing row, in input order
        rows: Vec<RowError>,
    },

    /// The repository refused the write
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BatchError {
    /// Taxonomy code of the first failure
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected { rows } => rows.first().and_then(|row| row.error.code()),
            Self::Repository(err) => err.code(),
        }
    }

    /// Whether a corrected batch can be retried
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Rejected { .. } => true,
            Self::Repository(err) => err.is_recoverable(),
        }
    }
}

/// Outcome of an applied batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Revision published, `None` when the batch changed nothing
    pub revision: Option<u64>,
    /// Touched ids
    pub changes: ChangeSummary,
    /// Rows skipped as identical to the committed entity
    pub unchanged: usize,
}

/// Apply `batch` to `repo` in place
///
/// Nodes are applied before edges. On error `repo` is left partially
/// modified; callers pass a clone.
///
/// # Errors
/// Every failing row.
pub fn apply_batch(
    repo: &mut GraphRepository,
    batch: &BatchImport,
    mode: ImportMode,
    stamp: &Stamp,
) -> std::result::Result<(ChangeSummary, usize), Vec<RowError>> {
    let mut changes = ChangeSummary::default();
    let mut unchanged = 0;
    let mut errors = Vec::new();

    for (row, record) in batch.objects.iter().enumerate() {
        match import_object(repo, record, mode, stamp) {
            Ok(Outcome::Added) => changes.nodes_added.push(record.id.as_str().into()),
            Ok(Outcome::Modified) => changes.nodes_modified.push(record.id.as_str().into()),
            Ok(Outcome::Unchanged) => unchanged += 1,
            Err(error) => errors.push(RowError {
                section: BatchSection::Objects,
                row,
                id: Some(record.id.clone()),
                error,
            }),
        }
    }

    for (row, record) in batch.relationships.iter().enumerate() {
        match import_relationship(repo, record, mode, stamp) {
            Ok((id, Outcome::Added)) => changes.edges_added.push(id),
            Ok((id, Outcome::Modified)) => changes.edges_modified.push(id),
            Ok((_, Outcome::Unchanged)) => unchanged += 1,
            Err(error) => errors.push(RowError {
                section: BatchSection::Relationships,
                row,
                id: record.id.clone(),
                error,
            }),
        }
    }

    if errors.is_empty() {
        Ok((changes, unchanged))
    } else {
        Err(errors)
    }
}

enum Outcome {
    Added,
    Modified,
    Unchanged,
}

fn import_object(
    repo: &mut GraphRepository,
    record: &ObjectRecord,
    mode: ImportMode,
    stamp: &Stamp,
) -> Result<Outcome> {
    let node = record.to_node()?;
    let attributes = strip_bookkeeping(&node.attributes);
    let Some(existing) = repo.node(&node.id) else {
        repo.add_node(
            NodeSpec::new(node.kind, attributes).with_id(node.id),
            stamp,
        )?;
        return Ok(Outcome::Added);
    };
    if mode == ImportMode::CreateOnly {
        return Err(RepositoryError::DuplicateId {
            entity: crate::error::EntityType::Node,
            id: record.id.clone(),
        });
    }
    if existing.kind == node.kind && semantically_equal(&existing.attributes, &attributes) {
        return Ok(Outcome::Unchanged);
    }
    repo.modify_node(&node.id, node.kind, &attributes, stamp)?;
    Ok(Outcome::Modified)
}

fn import_relationship(
    repo: &mut GraphRepository,
    record: &RelationshipRecord,
    mode: ImportMode,
    stamp: &Stamp,
) -> Result<(archgraph_model::EdgeId, Outcome)> {
    let edge = record.to_edge()?;
    let attributes = strip_bookkeeping(&edge.attributes);
    let Some(existing) = repo.edge(&edge.id) else {
        let id = repo.add_edge(
            EdgeSpec::new(edge.kind, edge.from_id, edge.to_id)
                .with_id(edge.id)
                .with_attributes(attributes),
            stamp,
        )?;
        return Ok((id, Outcome::Added));
    };
    if mode == ImportMode::CreateOnly {
        return Err(RepositoryError::DuplicateId {
            entity: crate::error::EntityType::Edge,
            id: edge.id.to_string(),
        });
    }
    if existing.kind == edge.kind
        && existing.from_id == edge.from_id
        && existing.to_id == edge.to_id
        && semantically_equal(&existing.attributes, &attributes)
    {
        return Ok((edge.id, Outcome::Unchanged));
    }
    repo.modify_edge(&edge.id, edge.kind, &edge.from_id, &edge.to_id, &attributes, stamp)?;
    Ok((edge.id, Outcome::Modified))
}

impl RepositoryHandle {
    /// Import a batch atomically
    ///
    /// # Errors
    /// `Rejected` with every row error, or `Repository` when the write is
    /// refused.
    pub fn import(
        &self,
        batch: &BatchImport,
        mode: ImportMode,
        actor: &str,
    ) -> std::result::Result<BatchReport, BatchError> {
        let guard = self.begin_write()?;
        let stamp = Stamp::now(actor);
        let mut next = (**guard.base()).clone();

        let (changes, unchanged) = apply_batch(&mut next, batch, mode, &stamp).map_err(|rows| {
            tracing::warn!(
                repository = self.name(),
                rejected = rows.len(),
                rows = batch.len(),
                "batch import rejected"
            );
            BatchError::Rejected { rows }
        })?;

        if changes.is_empty() {
            tracing::info!(repository = self.name(), unchanged, "batch import changed nothing");
            return Ok(BatchReport {
                revision: None,
                changes,
                unchanged,
            });
        }

        let mut records = AuditRecord::for_changes(actor, &changes);
        records.push(
            AuditRecord::new(actor, AuditAction::BatchImported, self.name())
                .with_detail(format!("{changes}; {unchanged} unchanged")),
        );
        let revision =
            guard.publish(next, &stamp, ChangeCause::BatchImport, changes.clone(), records);
        tracing::info!(
            repository = self.name(),
            revision,
            changes = %changes,
            unchanged,
            "batch import applied"
        );
        Ok(BatchReport {
            revision: Some(revision),
            changes,
            unchanged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;
    use archgraph_model::SchemaRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn handle() -> RepositoryHandle {
        RepositoryHandle::open(
            RepositoryConfig::default(),
            Arc::new(SchemaRegistry::standard()),
        )
    }

    fn batch() -> BatchImport {
        serde_json::from_value(json!({
            "objects": [
                { "id": "ent", "type": "Enterprise", "attributes": { "name": "Acme" } },
                { "id": "cap", "type": "capability", "attributes": { "name": "Pay" } }
            ],
            "relationships": [
                { "id": "owns", "fromId": "ent", "toId": "cap", "type": "owns" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn import_applies_all_rows() {
        let handle = handle();
        let report = handle.import(&batch(), ImportMode::CreateOnly, "importer").unwrap();
        assert_eq!(report.revision, Some(1));
        assert_eq!(report.changes.len(), 3);
        assert_eq!(handle.current().unwrap().edge_count(), 1);
        // three entity records plus the summary
        assert_eq!(handle.audit().len(), 4);
    }

    #[test]
    fn any_bad_row_rejects_the_batch() {
        let handle = handle();
        let mut bad = batch();
        bad.objects[1].kind = "Spaceship".into();
        bad.relationships.push(RelationshipRecord {
            id: None,
            from_id: "ent".into(),
            to_id: "ghost".into(),
            kind: "OWNS".into(),
            attributes: Default::default(),
        });

        let err = handle.import(&bad, ImportMode::CreateOnly, "importer").unwrap_err();
        let BatchError::Rejected { rows } = err else {
            panic!("expected row errors");
        };
        // the unknown kind, then both edges (cap missing, ghost missing)
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].section, BatchSection::Objects);
        assert_eq!(rows[0].error.code(), Some(ErrorCode::UnknownType));
        assert_eq!(handle.revision(), 0);
        assert_eq!(handle.current().unwrap().node_count(), 0);
    }

    #[test]
    fn create_only_rejects_existing_ids() {
        let handle = handle();
        handle.import(&batch(), ImportMode::CreateOnly, "importer").unwrap();
        let err = handle.import(&batch(), ImportMode::CreateOnly, "importer").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::DuplicateId));
    }

    #[test]
    fn upsert_skips_identical_rows() {
        let handle = handle();
        handle.import(&batch(), ImportMode::CreateOnly, "importer").unwrap();

        let report = handle.import(&batch(), ImportMode::Upsert, "importer").unwrap();
        assert_eq!(report.revision, None);
        assert_eq!(report.unchanged, 3);

        let mut renamed = batch();
        renamed.objects[1].attributes.insert("name".into(), json!("Payments"));
        let report = handle.import(&renamed, ImportMode::Upsert, "importer").unwrap();
        assert_eq!(report.changes.nodes_modified.len(), 1);
        assert_eq!(report.unchanged, 2);
    }
}
