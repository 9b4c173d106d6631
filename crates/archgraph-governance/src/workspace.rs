//! Staging workspace
//!
//! A [`Workspace`] holds draft nodes and edges in staging order,
//! independent of the live repository. Drafts are edited in place
//! (last write wins per attribute); only the final draft value is
//! compared with the committed baseline at commit time. Cardinality is
//! never checked while staging.
//!
//! Status only moves forward: `Draft → Committed` or `Draft → Discarded`.

use crate::error::WorkspaceError;
use archgraph_model::{
    apply_patch, strip_bookkeeping, Attributes, Edge, EdgeId, EdgeKind, EdgeSpec, Node, NodeId,
    NodeKind, NodeSpec, PatchMode,
};
use archgraph_repository::{EntityType, GraphRepository, RepositoryError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Workspace lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    /// Accepting edits
    Draft,
    /// Merged into the repository (terminal)
    Committed,
    /// Abandoned (terminal)
    Discarded,
}

impl WorkspaceStatus {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Committed => "committed",
            Self::Discarded => "discarded",
        })
    }
}

/// Draft lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Awaiting commit
    Staged,
    /// Merged by a commit
    Committed,
    /// Dropped with its workspace
    Discarded,
}

/// Staged node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    /// Node id
    pub id: NodeId,
    /// Proposed kind
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Proposed semantic attributes
    pub attributes: Attributes,
    /// Draft state
    pub status: DraftStatus,
    /// Pending removal of the committed node
    pub tombstone: bool,
}

impl NodeDraft {
    /// Node this draft would commit
    #[must_use]
    pub fn to_node(&self) -> Node {
        Node {
            id: self.id.clone(),
            kind: self.kind,
            attributes: self.attributes.clone(),
        }
    }
}

/// Staged edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDraft {
    /// Edge id
    pub id: EdgeId,
    /// Proposed kind
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    /// Proposed source
    pub from_id: NodeId,
    /// Proposed target
    pub to_id: NodeId,
    /// Proposed semantic attributes
    pub attributes: Attributes,
    /// Draft state
    pub status: DraftStatus,
    /// Pending removal of the committed edge
    pub tombstone: bool,
}

impl EdgeDraft {
    /// Edge this draft would commit
    #[must_use]
    pub fn to_edge(&self) -> Edge {
        Edge {
            id: self.id.clone(),
            kind: self.kind,
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

type Result<T> = std::result::Result<T, WorkspaceError>;

/// Isolated staging area
#[derive(Debug, Clone)]
pub struct Workspace {
    id: String,
    status: WorkspaceStatus,
    iterative: bool,
    nodes: IndexMap<NodeId, NodeDraft>,
    edges: IndexMap<EdgeId, EdgeDraft>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Governed workspace with a generated id
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(format!("ws-{}", uuid::Uuid::new_v4()))
    }

    /// Governed workspace with a fixed id
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: WorkspaceStatus::Draft,
            iterative: false,
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as iterative: findings never block its commit
    #[must_use]
    pub fn iterative(mut self) -> Self {
        self.iterative = true;
        self
    }

    /// Workspace id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lifecycle state
    #[inline]
    #[must_use]
    pub fn status(&self) -> WorkspaceStatus {
        self.status
    }

    /// Whether findings are advisory only
    #[inline]
    #[must_use]
    pub fn is_iterative(&self) -> bool {
        self.iterative
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn node_drafts(&self) -> impl Iterator<Item = &NodeDraft> {
        self.nodes.values()
    }

    pub fn edge_drafts(&self) -> impl Iterator<Item = &EdgeDraft> {
        self.edges.values()
    }

    /// Look up a node draft
    #[must_use]
    pub fn node_draft(&self, id: &NodeId) -> Option<&NodeDraft> {
        self.nodes.get(id)
    }

    /// Look up an edge draft
    #[must_use]
    pub fn edge_draft(&self, id: &EdgeId) -> Option<&EdgeDraft> {
        self.edges.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Stage a node
    ///
    /// Re-staging a drafted id edits that draft: the kind is replaced and
    /// the attributes are merged.
    ///
    /// # Errors
    /// `WorkspaceClosed` outside `Draft`.
    pub fn stage_node(&mut self, spec: NodeSpec) -> Result<NodeId> {
        self.ensure_draft()?;
        let id = spec.id.unwrap_or_else(NodeId::generate);
        let attributes = strip_bookkeeping(&spec.attributes);
        match self.nodes.get_mut(&id) {
            Some(draft) => {
                draft.kind = spec.kind;
                apply_patch(&mut draft.attributes, &attributes, PatchMode::Merge);
            }
            None => {
                self.nodes.insert(
                    id.clone(),
                    NodeDraft {
                        id: id.clone(),
                        kind: spec.kind,
                        attributes,
                        status: DraftStatus::Staged,
                        tombstone: false,
                    },
                );
            }
        }
        self.touch();
        tracing::debug!(workspace = %self.id, node = %id, "node staged");
        Ok(id)
    }

    /// Stage an edge
    ///
    /// Endpoints are not checked while staging.
    ///
    /// # Errors
    /// `WorkspaceClosed` outside `Draft`.
    pub fn stage_edge(&mut self, spec: EdgeSpec) -> Result<EdgeId> {
        self.ensure_draft()?;
        let id = spec.id.unwrap_or_else(EdgeId::generate);
        let attributes = strip_bookkeeping(&spec.attributes);
        match self.edges.get_mut(&id) {
            Some(draft) => {
                draft.kind = spec.kind;
                draft.from_id = spec.from_id;
                draft.to_id = spec.to_id;
                apply_patch(&mut draft.attributes, &attributes, PatchMode::Merge);
            }
            None => {
                self.edges.insert(
                    id.clone(),
                    EdgeDraft {
                        id: id.clone(),
                        kind: spec.kind,
                        from_id: spec.from_id,
                        to_id: spec.to_id,
                        attributes,
                        status: DraftStatus::Staged,
                        tombstone: false,
                    },
                );
            }
        }
        self.touch();
        tracing::debug!(workspace = %self.id, edge = %id, "edge staged");
        Ok(id)
    }

    /// Draft a committed node for editing; an existing draft is kept
    ///
    /// # Errors
    /// `WorkspaceClosed`, or `NotFound` if the node is not committed.
    pub fn stage_existing_node(&mut self, repo: &GraphRepository, id: &NodeId) -> Result<()> {
        self.ensure_draft()?;
        if self.nodes.contains_key(id) {
            return Ok(());
        }
        let node = repo.node(id).ok_or_else(|| RepositoryError::NotFound {
            entity: EntityType::Node,
            id: id.to_string(),
        })?;
        self.nodes.insert(
            id.clone(),
            NodeDraft {
                id: id.clone(),
                kind: node.kind,
                attributes: strip_bookkeeping(&node.attributes),
                status: DraftStatus::Staged,
                tombstone: false,
            },
        );
        self.touch();
        Ok(())
    }

    /// Draft a committed edge for editing; an existing draft is kept
    ///
    /// # Errors
    /// `WorkspaceClosed`, or `NotFound` if the edge is not committed.
    pub fn stage_existing_edge(&mut self, repo: &GraphRepository, id: &EdgeId) -> Result<()> {
        self.ensure_draft()?;
        if self.edges.contains_key(id) {
            return Ok(());
        }
        let edge = repo.edge(id).ok_or_else(|| RepositoryError::NotFound {
            entity: EntityType::Edge,
            id: id.to_string(),
        })?;
        self.edges.insert(
            id.clone(),
            EdgeDraft {
                id: id.clone(),
                kind: edge.kind,
                from_id: edge.from_id.clone(),
                to_id: edge.to_id.clone(),
                attributes: strip_bookkeeping(&edge.attributes),
                status: DraftStatus::Staged,
                tombstone: false,
            },
        );
        self.touch();
        Ok(())
    }

    /// Merge `patch` into a node draft; `null` values remove keys
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn edit_node_attributes(&mut self, id: &NodeId, patch: &Attributes) -> Result<()> {
        self.ensure_draft()?;
        let draft = self.nodes.get_mut(id).ok_or_else(|| not_drafted(EntityType::Node, id))?;
        apply_patch(&mut draft.attributes, &strip_bookkeeping(patch), PatchMode::Merge);
        self.touch();
        Ok(())
    }

    /// Merge `patch` into an edge draft; `null` values remove keys
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn edit_edge_attributes(&mut self, id: &EdgeId, patch: &Attributes) -> Result<()> {
        self.ensure_draft()?;
        let draft = self.edges.get_mut(id).ok_or_else(|| not_drafted(EntityType::Edge, id))?;
        apply_patch(&mut draft.attributes, &strip_bookkeeping(patch), PatchMode::Merge);
        self.touch();
        Ok(())
    }

    /// Tombstone a node draft
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn mark_node_for_removal(&mut self, id: &NodeId) -> Result<()> {
        self.set_node_tombstone(id, true)
    }

    /// Clear a node draft's tombstone
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn undo_node_removal(&mut self, id: &NodeId) -> Result<()> {
        self.set_node_tombstone(id, false)
    }

    /// Tombstone an edge draft
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn mark_edge_for_removal(&mut self, id: &EdgeId) -> Result<()> {
        self.set_edge_tombstone(id, true)
    }

    /// Clear an edge draft's tombstone
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn undo_edge_removal(&mut self, id: &EdgeId) -> Result<()> {
        self.set_edge_tombstone(id, false)
    }

    /// Draft a committed node and tombstone it
    ///
    /// # Errors
    /// `WorkspaceClosed`, or `NotFound` if the node is not committed.
    pub fn stage_node_removal(&mut self, repo: &GraphRepository, id: &NodeId) -> Result<()> {
        self.stage_existing_node(repo, id)?;
        self.mark_node_for_removal(id)
    }

    /// Draft a committed edge and tombstone it
    ///
    /// # Errors
    /// `WorkspaceClosed`, or `NotFound` if the edge is not committed.
    pub fn stage_edge_removal(&mut self, repo: &GraphRepository, id: &EdgeId) -> Result<()> {
        self.stage_existing_edge(repo, id)?;
        self.mark_edge_for_removal(id)
    }

    /// Drop a node draft entirely
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn unstage_node(&mut self, id: &NodeId) -> Result<NodeDraft> {
        self.ensure_draft()?;
        let draft = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| not_drafted(EntityType::Node, id))?;
        self.touch();
        Ok(draft)
    }

    /// Drop an edge draft entirely
    ///
    /// # Errors
    /// `WorkspaceClosed` or `NotDrafted`.
    pub fn unstage_edge(&mut self, id: &EdgeId) -> Result<EdgeDraft> {
        self.ensure_draft()?;
        let draft = self
            .edges
            .shift_remove(id)
            .ok_or_else(|| not_drafted(EntityType::Edge, id))?;
        self.touch();
        Ok(draft)
    }

    /// Abandon the workspace
    ///
    /// Clears every draft and never touches the repository.
    ///
    /// # Errors
    /// `WorkspaceClosed` outside `Draft`.
    pub fn discard(&mut self) -> Result<()> {
        self.ensure_draft()?;
        self.nodes.clear();
        self.edges.clear();
        self.status = WorkspaceStatus::Discarded;
        self.touch();
        tracing::debug!(workspace = %self.id, "workspace discarded");
        Ok(())
    }

    pub(crate) fn mark_committed(&mut self) {
        for draft in self.nodes.values_mut() {
            draft.status = DraftStatus::Committed;
        }
        for draft in self.edges.values_mut() {
            draft.status = DraftStatus::Committed;
        }
        self.status = WorkspaceStatus::Committed;
        self.touch();
        tracing::debug!(workspace = %self.id, "workspace committed");
    }

    fn set_node_tombstone(&mut self, id: &NodeId, tombstone: bool) -> Result<()> {
        self.ensure_draft()?;
        let draft = self.nodes.get_mut(id).ok_or_else(|| not_drafted(EntityType::Node, id))?;
        draft.tombstone = tombstone;
        self.touch();
        Ok(())
    }

    fn set_edge_tombstone(&mut self, id: &EdgeId, tombstone: bool) -> Result<()> {
        self.ensure_draft()?;
        let draft = self.edges.get_mut(id).ok_or_else(|| not_drafted(EntityType::Edge, id))?;
        draft.tombstone = tombstone;
        self.touch();
        Ok(())
    }

    fn ensure_draft(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WorkspaceError::WorkspaceClosed {
                id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn not_drafted(entity: EntityType, id: &impl fmt::Display) -> WorkspaceError {
    WorkspaceError::NotDrafted {
        entity,
        id: id.to_string(),
    }
}
