//! Snapshots and the versioned snapshot document
//!
//! A [`Snapshot`] is an immutable, structurally shared copy of a
//! repository's collections used for undo/redo and diff baselines. A
//! [`SnapshotDocument`] is the persisted JSON form:
//!
//! ```json
//! {
//!   "version": 1,
//!   "metadata": { "name": "Acme", "revision": 3 },
//!   "objects": [{ "id": "cap-1", "type": "Capability", "attributes": {} }],
//!   "relationships": [{ "id": "e-1", "fromId": "ent", "toId": "cap-1", "type": "OWNS", "attributes": {} }],
//!   "updatedAt": "2026-01-01T00:00:00Z"
//! }
//! ```

use crate::error::RepositoryError;
use crate::graph::GraphRepository;
use archgraph_model::{Attributes, Edge, EdgeId, EdgeKind, Node, NodeId, NodeKind, SchemaRegistry};
use chrono::{DateTime, Utc};
use im::{OrdMap, OrdSet};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Current snapshot document format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Immutable point-in-time copy of a repository's collections
#[derive(Debug, Clone)]
pub struct Snapshot {
    revision: u64,
    taken_at: DateTime<Utc>,
    nodes: OrdMap<NodeId, Node>,
    edges: OrdMap<EdgeId, Edge>,
    incidence: OrdMap<NodeId, OrdSet<EdgeId>>,
}

impl Snapshot {
    pub(crate) fn new(
        revision: u64,
        taken_at: DateTime<Utc>,
        nodes: OrdMap<NodeId, Node>,
        edges: OrdMap<EdgeId, Edge>,
        incidence: OrdMap<NodeId, OrdSet<EdgeId>>,
    ) -> Self {
        Self {
            revision,
            taken_at,
            nodes,
            edges,
            incidence,
        }
    }

    /// Revision the snapshot was taken at
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Time of the last mutation captured
    #[inline]
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up an edge
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn collections(
        &self,
    ) -> (
        OrdMap<NodeId, Node>,
        OrdMap<EdgeId, Edge>,
        OrdMap<NodeId, OrdSet<EdgeId>>,
    ) {
        (self.nodes.clone(), self.edges.clone(), self.incidence.clone())
    }
}

/// Failure loading or saving a snapshot document
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Document format newer or older than supported
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
    },

    /// Malformed JSON
    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Content violates a repository invariant
    #[error("invalid snapshot content: {0}")]
    Repository(#[from] RepositoryError),
}

impl SnapshotError {
    /// Taxonomy code, when the failure maps onto one
    #[must_use]
    pub fn code(&self) -> Option<archgraph_model::ErrorCode> {
        match self {
            Self::Repository(err) => err.code(),
            Self::UnsupportedVersion { .. } | Self::Parse(_) => None,
        }
    }

    /// Snapshot failures are fixed by editing the document, never by retrying
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        false
    }
}

/// Document header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Repository name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Revision at save time
    #[serde(default)]
    pub revision: u64,
}

/// One node in a document or batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Node id
    pub id: String,
    /// Node kind name
    #[serde(rename = "type")]
    pub kind: String,
    /// Attributes, bookkeeping included
    #[serde(default)]
    pub attributes: Attributes,
}

/// One edge in a document or batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    /// Edge id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id
    pub from_id: String,
    /// Target node id
    pub to_id: String,
    /// Edge kind name
    #[serde(rename = "type")]
    pub kind: String,
    /// Attributes, bookkeeping included
    #[serde(default)]
    pub attributes: Attributes,
}

impl From<&Node> for ObjectRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            kind: node.kind.as_str().to_string(),
            attributes: node.attributes.clone(),
        }
    }
}

impl From<&Edge> for RelationshipRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            id: Some(edge.id.to_string()),
            from_id: edge.from_id.to_string(),
            to_id: edge.to_id.to_string(),
            kind: edge.kind.as_str().to_string(),
            attributes: edge.attributes.clone(),
        }
    }
}

impl ObjectRecord {
    /// Parse into a node
    ///
    /// # Errors
    /// `UnknownType` for a kind outside the vocabulary.
    pub fn to_node(&self) -> Result<Node, RepositoryError> {
        Ok(Node {
            id: NodeId::new(self.id.as_str()),
            kind: NodeKind::from_str(&self.kind)?,
            attributes: self.attributes.clone(),
        })
    }
}

impl RelationshipRecord {
    /// Parse into an edge, generating an id when absent
    ///
    /// # Errors
    /// `UnknownType` for a kind outside the vocabulary.
    pub fn to_edge(&self) -> Result<Edge, RepositoryError> {
        Ok(Edge {
            id: self
                .id
                .as_deref()
                .map_or_else(EdgeId::generate, EdgeId::new),
            kind: EdgeKind::from_str(&self.kind)?,
            from_id: NodeId::new(self.from_id.as_str()),
            to_id: NodeId::new(self.to_id.as_str()),
            attributes: self.attributes.clone(),
        })
    }
}

/// Persisted repository state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    /// Format version
    pub version: u32,
    /// Header
    pub metadata: SnapshotMetadata,
    /// Nodes
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    /// Edges
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
    /// Time of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl SnapshotDocument {
    /// Parse a document
    ///
    /// # Errors
    /// `Parse` on malformed JSON, `UnsupportedVersion` on a foreign format.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let doc: Self = serde_json::from_str(text)?;
        if doc.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { found: doc.version });
        }
        Ok(doc)
    }

    /// Pretty-printed JSON
    ///
    /// # Errors
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl GraphRepository {
    /// Export the repository as a snapshot document
    #[must_use]
    pub fn to_document(&self) -> SnapshotDocument {
        SnapshotDocument {
            version: SNAPSHOT_VERSION,
            metadata: SnapshotMetadata {
                name: self.name().to_string(),
                description: self.description().map(str::to_string),
                revision: self.revision(),
            },
            objects: self.nodes().map(ObjectRecord::from).collect(),
            relationships: self.edges().map(RelationshipRecord::from).collect(),
            updated_at: self.updated_at(),
        }
    }

    /// Build a repository from a snapshot document
    ///
    /// Bookkeeping attributes are preserved verbatim. All nodes load before
    /// any edge, so relationship order in the document does not matter.
    ///
    /// # Errors
    /// `UnsupportedVersion`, or `Repository` for unknown kinds, duplicate
    /// ids, dangling endpoints and illegal endpoint types.
    pub fn from_document(
        doc: &SnapshotDocument,
        schema: Arc<SchemaRegistry>,
    ) -> Result<Self, SnapshotError> {
        if doc.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion { found: doc.version });
        }
        let mut repo = GraphRepository::new(doc.metadata.name.clone(), schema);
        repo.set_description(doc.metadata.description.clone());
        for record in &doc.objects {
            repo.load_node(record.to_node()?)?;
        }
        for record in &doc.relationships {
            repo.load_edge(record.to_edge()?)?;
        }
        repo.set_revision(doc.metadata.revision, doc.updated_at);
        Ok(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgraph_model::{EdgeSpec, NodeSpec, Stamp};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> GraphRepository {
        let mut repo = GraphRepository::with_standard_schema("Acme");
        let stamp = Stamp::now("alice");
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!("Acme"));
        repo.add_node(NodeSpec::new(NodeKind::Enterprise, attrs.clone()).with_id("ent"), &stamp)
            .unwrap();
        attrs.insert("name".into(), json!("Payments"));
        repo.add_node(NodeSpec::new(NodeKind::Capability, attrs).with_id("cap"), &stamp)
            .unwrap();
        repo.add_edge(
            EdgeSpec::new(EdgeKind::Owns, "ent", "cap").with_id("owns-1"),
            &stamp,
        )
        .unwrap();
        repo
    }

    #[test]
    fn document_uses_wire_names() {
        let doc = sample().to_document();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], json!(1));
        assert_eq!(value["relationships"][0]["fromId"], json!("ent"));
        assert_eq!(value["relationships"][0]["type"], json!("OWNS"));
        assert_eq!(value["objects"][0]["type"], json!("Capability"));
        assert!(value.get("updatedAt").is_some());
    }

    #[test]
    fn document_round_trip_is_lossless() {
        let repo = sample();
        let text = repo.to_document().to_json_pretty().unwrap();
        let doc = SnapshotDocument::from_json(&text).unwrap();
        let loaded = GraphRepository::from_document(&doc, repo.schema().clone()).unwrap();
        assert_eq!(loaded.to_document(), repo.to_document());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut doc = sample().to_document();
        doc.version = 7;
        let text = serde_json::to_string(&doc).unwrap();
        assert!(matches!(
            SnapshotDocument::from_json(&text),
            Err(SnapshotError::UnsupportedVersion { found: 7 })
        ));
    }

    #[test]
    fn rejects_dangling_relationship() {
        let mut doc = sample().to_document();
        doc.relationships[0].to_id = "ghost".into();
        let err = GraphRepository::from_document(&doc, Arc::new(SchemaRegistry::standard()))
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Repository(RepositoryError::DanglingEndpoint { .. })
        ));
    }

    #[test]
    fn rejects_unknown_kind() {
        let mut doc = sample().to_document();
        doc.objects[0].kind = "Spaceship".into();
        let err = GraphRepository::from_document(&doc, Arc::new(SchemaRegistry::standard()))
            .unwrap_err();
        assert_eq!(err.code(), Some(archgraph_model::ErrorCode::UnknownType));
    }
}
