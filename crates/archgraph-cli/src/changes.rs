//! Change documents: a workspace serialized as JSON
//!
//! ```json
//! {
//!   "iterative": false,
//!   "nodes": [{ "id": "cap-pay", "type": "Capability", "attributes": { "name": "Payments" } }],
//!   "edges": [{ "id": "owns-pay", "fromId": "ent", "toId": "cap-pay", "type": "OWNS" }],
//!   "removeNodes": [],
//!   "removeEdges": []
//! }
//! ```
//!
//! Node and edge rows use the snapshot record format. Removals name
//! committed ids.

use archgraph_governance::{Workspace, WorkspaceError};
use archgraph_model::{EdgeId, EdgeSpec, NodeId, NodeSpec};
use archgraph_repository::snapshot::{ObjectRecord, RelationshipRecord};
use archgraph_repository::GraphRepository;
use serde::{Deserialize, Serialize};

/// Staged changes read from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeDocument {
    /// Validate non-blocking regardless of governance
    pub iterative: bool,
    /// Nodes to stage
    pub nodes: Vec<ObjectRecord>,
    /// Edges to stage
    pub edges: Vec<RelationshipRecord>,
    /// Committed nodes to remove
    pub remove_nodes: Vec<String>,
    /// Committed edges to remove
    pub remove_edges: Vec<String>,
}

impl ChangeDocument {
    /// Parse a change document
    ///
    /// # Errors
    /// Malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Stage every row into a fresh workspace
    ///
    /// Rows are staged in document order, removals last.
    ///
    /// # Errors
    /// `UnknownType` for a kind outside the vocabulary, `NotFound` for a
    /// removal of an uncommitted id.
    pub fn to_workspace(&self, repo: &GraphRepository) -> Result<Workspace, WorkspaceError> {
        let mut workspace = if self.iterative {
            Workspace::new().iterative()
        } else {
            Workspace::new()
        };

        for record in &self.nodes {
            let node = record.to_node()?;
            workspace.stage_node(NodeSpec::new(node.kind, node.attributes).with_id(node.id))?;
        }
        for record in &self.edges {
            let edge = record.to_edge()?;
            workspace.stage_edge(
                EdgeSpec::new(edge.kind, edge.from_id, edge.to_id)
                    .with_id(edge.id)
                    .with_attributes(edge.attributes),
            )?;
        }
        for id in &self.remove_nodes {
            workspace.stage_node_removal(repo, &NodeId::new(id.as_str()))?;
        }
        for id in &self.remove_edges {
            workspace.stage_edge_removal(repo, &EdgeId::new(id.as_str()))?;
        }
        Ok(workspace)
    }
}
