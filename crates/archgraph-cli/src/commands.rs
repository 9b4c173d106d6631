//! Subcommand implementations
//!
//! Each command loads a snapshot file, runs one operation through a
//! [`Session`] and returns a report that renders as text or JSON.

use crate::changes::ChangeDocument;
use crate::config::ArchgraphConfig;
use anyhow::Context;
use archgraph_governance::{
    Actor, CommitError, Finding, Role, Session, SessionError, ValidationReport,
};
use archgraph_model::{EdgeId, SchemaRegistry};
use archgraph_repository::{
    AuditEvent, AutosaveTask, BatchError, BatchImport, ChangeSummary, FileSnapshotSink,
    ImportMode, RepositoryHandle, ScheduledTask, SnapshotDocument, SnapshotSink,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Render a report as pretty JSON or its text form
///
/// # Errors
/// JSON serialization failure.
pub fn render<T: Serialize + fmt::Display>(report: &T, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(report.to_string())
    }
}

/// Open the repository stored at `path`
///
/// With `create`, a missing file yields an empty repository named after
/// the configuration.
///
/// # Errors
/// Unreadable or invalid snapshot.
pub fn open_handle(
    config: &ArchgraphConfig,
    path: &Path,
    create: bool,
) -> anyhow::Result<Arc<RepositoryHandle>> {
    let schema = Arc::new(SchemaRegistry::standard());
    if create && !path.exists() {
        tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
        return Ok(Arc::new(RepositoryHandle::open(
            config.repository.clone(),
            schema,
        )));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read snapshot {}", path.display()))?;
    let doc = SnapshotDocument::from_json(&text)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    Ok(Arc::new(RepositoryHandle::load(
        &doc,
        schema,
        config.repository.clone(),
    )?))
}

fn read_changes(path: &Path) -> anyhow::Result<ChangeDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read changes {}", path.display()))?;
    ChangeDocument::from_json(&text).with_context(|| format!("invalid changes {}", path.display()))
}

/// Write the repository to `target`, then give autosave its tick
fn persist(
    config: &ArchgraphConfig,
    handle: &Arc<RepositoryHandle>,
    target: &Path,
) -> anyhow::Result<()> {
    FileSnapshotSink::new(target).save(&handle.snapshot_document()?)?;
    tracing::info!(path = %target.display(), revision = handle.revision(), "snapshot written");

    if let Some(mut task) = AutosaveTask::from_config(Arc::clone(handle), &config.autosave) {
        let now = Utc::now();
        if task.is_due(now) {
            task.run(now)?;
        }
    }
    Ok(())
}

/// Repository summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Repository name
    pub name: String,
    /// Current revision
    pub revision: u64,
    /// Node count
    pub nodes: usize,
    /// Edge count
    pub edges: usize,
    /// Nodes per kind
    pub nodes_by_kind: BTreeMap<String, usize>,
    /// Edges per kind
    pub edges_by_kind: BTreeMap<String, usize>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} @ revision {}", self.name, self.revision)?;
        writeln!(f, "  nodes: {}", self.nodes)?;
        for (kind, count) in &self.nodes_by_kind {
            writeln!(f, "    {kind}: {count}")?;
        }
        writeln!(f, "  edges: {}", self.edges)?;
        for (kind, count) in &self.edges_by_kind {
            writeln!(f, "    {kind}: {count}")?;
        }
        Ok(())
    }
}

/// Summarize a snapshot
///
/// # Errors
/// Unreadable or invalid snapshot.
pub fn stats(config: &ArchgraphConfig, snapshot: &Path) -> anyhow::Result<Stats> {
    let handle = open_handle(config, snapshot, false)?;
    let session = Session::new(
        handle,
        Actor::new("archgraph", Role::Viewer),
        config.governance.clone(),
    )?;
    let repo = session.read()?;

    let mut nodes_by_kind = BTreeMap::new();
    for node in repo.nodes() {
        *nodes_by_kind.entry(node.kind.to_string()).or_insert(0) += 1;
    }
    let mut edges_by_kind = BTreeMap::new();
    for edge in repo.edges() {
        *edges_by_kind.entry(edge.kind.to_string()).or_insert(0) += 1;
    }
    Ok(Stats {
        name: repo.name().to_string(),
        revision: repo.revision(),
        nodes: repo.node_count(),
        edges: repo.edge_count(),
        nodes_by_kind,
        edges_by_kind,
    })
}

/// Findings for a change document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    /// Repository validated against
    pub repository: String,
    /// Its revision
    pub revision: u64,
    /// Findings
    pub report: ValidationReport,
}

impl ValidationOutcome {
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.report.is_blocking()
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.report.findings {
            writeln!(f, "{finding}")?;
        }
        writeln!(
            f,
            "{} finding(s) against {} @ revision {}{}",
            self.report.findings.len(),
            self.repository,
            self.revision,
            if self.is_blocking() { ", commit would be refused" } else { "" }
        )
    }
}

/// Validate a change document without committing
///
/// # Errors
/// Unreadable inputs or rows that cannot be staged.
pub fn validate(
    config: &ArchgraphConfig,
    snapshot: &Path,
    changes: &Path,
) -> anyhow::Result<ValidationOutcome> {
    let handle = open_handle(config, snapshot, false)?;
    let session = Session::new(
        handle,
        Actor::new("archgraph", Role::Viewer),
        config.governance.clone(),
    )?;
    let repo = session.read()?;
    let workspace = read_changes(changes)?.to_workspace(&repo)?;
    Ok(ValidationOutcome {
        repository: repo.name().to_string(),
        revision: repo.revision(),
        report: session.validate(&workspace)?,
    })
}

/// Result of `commit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    /// Whether the workspace reached the repository
    pub applied: bool,
    /// Committed workspace
    pub workspace_id: String,
    /// Published revision
    pub revision: Option<u64>,
    /// Applied changes
    pub changes: ChangeSummary,
    /// Edges skipped because an endpoint was removed
    pub skipped_edges: Vec<EdgeId>,
    /// Drafts identical to the committed graph
    pub unchanged: usize,
    /// Findings, blocking ones included when refused
    pub findings: Vec<Finding>,
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.findings {
            writeln!(f, "{finding}")?;
        }
        if !self.applied {
            return writeln!(f, "workspace {} refused", self.workspace_id);
        }
        match self.revision {
            Some(revision) => writeln!(
                f,
                "workspace {} committed as revision {revision}: {}",
                self.workspace_id, self.changes
            )?,
            None => writeln!(f, "workspace {} had nothing to commit", self.workspace_id)?,
        }
        if !self.skipped_edges.is_empty() {
            let skipped: Vec<&str> = self.skipped_edges.iter().map(EdgeId::as_str).collect();
            writeln!(f, "skipped edges: {}", skipped.join(", "))?;
        }
        Ok(())
    }
}

fn commit_document(
    session: &Session,
    doc: &ChangeDocument,
) -> anyhow::Result<CommitOutcome> {
    let repo = session.read()?;
    let mut workspace = doc.to_workspace(&repo)?;
    match session.commit(&mut workspace) {
        Ok(receipt) => Ok(CommitOutcome {
            applied: true,
            workspace_id: receipt.workspace_id,
            revision: receipt.revision,
            changes: receipt.changes,
            skipped_edges: receipt.skipped_edges,
            unchanged: receipt.unchanged,
            findings: receipt.findings,
        }),
        Err(SessionError::Commit(CommitError::GovernanceBlocked { findings })) => {
            Ok(CommitOutcome {
                applied: false,
                workspace_id: workspace.id().to_string(),
                revision: None,
                changes: ChangeSummary::default(),
                skipped_edges: Vec::new(),
                unchanged: 0,
                findings,
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Commit a change document and write the new snapshot
///
/// The snapshot is written to `out`, or back to `snapshot`, only when a
/// revision was published.
///
/// # Errors
/// Unreadable inputs, permission denial, or any commit failure other
/// than a governance refusal.
pub fn commit(
    config: &ArchgraphConfig,
    snapshot: &Path,
    changes: &Path,
    actor: Actor,
    out: Option<&Path>,
) -> anyhow::Result<CommitOutcome> {
    let handle = open_handle(config, snapshot, true)?;
    let session = Session::new(Arc::clone(&handle), actor, config.governance.clone())?;
    let outcome = commit_document(&session, &read_changes(changes)?)?;
    if outcome.revision.is_some() {
        persist(config, &handle, out.unwrap_or(snapshot))?;
    }
    Ok(outcome)
}

/// Result of `import`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    /// Whether the batch was applied
    pub applied: bool,
    /// Published revision
    pub revision: Option<u64>,
    /// Applied changes
    pub changes: ChangeSummary,
    /// Rows identical to the committed entity
    pub unchanged: usize,
    /// Row errors of a rejected batch
    pub rejected: Vec<String>,
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.applied {
            for row in &self.rejected {
                writeln!(f, "{row}")?;
            }
            return writeln!(f, "batch rejected: {} row error(s)", self.rejected.len());
        }
        match self.revision {
            Some(revision) => writeln!(f, "imported as revision {revision}: {}", self.changes),
            None => writeln!(f, "nothing to import ({} unchanged row(s))", self.unchanged),
        }
    }
}

/// Import a batch file and write the new snapshot
///
/// # Errors
/// Unreadable inputs, permission denial, or a repository failure.
pub fn import(
    config: &ArchgraphConfig,
    snapshot: &Path,
    batch: &Path,
    mode: ImportMode,
    actor: Actor,
    out: Option<&Path>,
) -> anyhow::Result<ImportOutcome> {
    let handle = open_handle(config, snapshot, true)?;
    let session = Session::new(Arc::clone(&handle), actor, config.governance.clone())?;
    let text = std::fs::read_to_string(batch)
        .with_context(|| format!("cannot read batch {}", batch.display()))?;
    let rows = BatchImport::from_json(&text)
        .with_context(|| format!("invalid batch {}", batch.display()))?;

    let outcome = match session.import(&rows, mode) {
        Ok(report) => ImportOutcome {
            applied: true,
            revision: report.revision,
            changes: report.changes,
            unchanged: report.unchanged,
            rejected: Vec::new(),
        },
        Err(SessionError::Batch(BatchError::Rejected { rows })) => ImportOutcome {
            applied: false,
            revision: None,
            changes: ChangeSummary::default(),
            unchanged: 0,
            rejected: rows.iter().map(ToString::to_string).collect(),
        },
        Err(err) => return Err(err.into()),
    };
    if outcome.revision.is_some() {
        persist(config, &handle, out.unwrap_or(snapshot))?;
    }
    Ok(outcome)
}

/// Audit trail of a sequence of commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReport {
    /// Repository name
    pub repository: String,
    /// Revision after the last commit
    pub revision: u64,
    /// Every audit event, in order
    pub events: Vec<AuditEvent>,
    /// Whether the hash chain verified
    pub intact: bool,
}

impl fmt::Display for HistoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            let hash = event.hash_hex();
            writeln!(
                f,
                "#{:<4} {} {:<12} {:<16} {} {}",
                event.sequence,
                event.timestamp.format("%Y-%m-%dT%H:%M:%SZ"),
                event.actor,
                event.action,
                event.subject,
                &hash[..12],
            )?;
        }
        writeln!(
            f,
            "{} event(s), {} @ revision {}, chain {}",
            self.events.len(),
            self.repository,
            self.revision,
            if self.intact { "intact" } else { "BROKEN" }
        )
    }
}

/// Commit each change document in order and report the audit trail
///
/// Nothing is written back to disk.
///
/// # Errors
/// Unreadable inputs, or the first commit that fails or is refused.
pub fn history(
    config: &ArchgraphConfig,
    snapshot: &Path,
    changes: &[PathBuf],
    actor: Actor,
) -> anyhow::Result<HistoryReport> {
    let handle = open_handle(config, snapshot, true)?;
    let session = Session::new(Arc::clone(&handle), actor, config.governance.clone())?;
    for path in changes {
        let outcome = commit_document(&session, &read_changes(path)?)?;
        if !outcome.applied {
            anyhow::bail!(
                "{} refused with {} finding(s)",
                path.display(),
                outcome.findings.iter().filter(|f| f.is_blocking()).count()
            );
        }
    }
    Ok(HistoryReport {
        repository: handle.name().to_string(),
        revision: handle.revision(),
        events: handle.audit().events(),
        intact: handle.audit().verify_integrity().is_ok(),
    })
}
