//! Draft classification against the committed graph
//!
//! Attributes are compared after stripping bookkeeping and canonicalizing
//! both sides, so key order and engine timestamps never produce spurious
//! modifications.

use crate::workspace::{EdgeDraft, NodeDraft, Workspace};
use archgraph_model::canonical::semantically_equal;
use archgraph_model::{EdgeId, NodeId};
use archgraph_repository::GraphRepository;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of one draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Not committed, not tombstoned
    Add,
    /// Committed and different
    Modify,
    /// Committed and tombstoned
    Remove,
    /// Identical to the committed entity, or tombstoned but never committed
    NoOp,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Remove => "remove",
            Self::NoOp => "no-op",
        })
    }
}

/// Classified node draft
#[derive(Debug, Clone, PartialEq)]
pub struct NodeChange {
    /// Classification
    pub kind: ChangeKind,
    /// Draft it came from
    pub draft: NodeDraft,
}

/// Classified edge draft
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeChange {
    /// Classification
    pub kind: ChangeKind,
    /// Draft it came from
    pub draft: EdgeDraft,
}

/// Effective changes of a workspace, in staging order
///
/// No-op drafts are excluded and only counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Node changes
    pub nodes: Vec<NodeChange>,
    /// Edge changes
    pub edges: Vec<EdgeChange>,
    /// Drafts classified as no-ops
    pub unchanged: usize,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    /// Node changes of one kind
    pub fn nodes_of(&self, kind: ChangeKind) -> impl Iterator<Item = &NodeChange> {
        self.nodes.iter().filter(move |change| change.kind == kind)
    }

    /// Edge changes of one kind
    pub fn edges_of(&self, kind: ChangeKind) -> impl Iterator<Item = &EdgeChange> {
        self.edges.iter().filter(move |change| change.kind == kind)
    }

    #[must_use]
    pub fn removed_node_ids(&self) -> Vec<&NodeId> {
        self.nodes_of(ChangeKind::Remove).map(|c| &c.draft.id).collect()
    }

    #[must_use]
    pub fn removed_edge_ids(&self) -> Vec<&EdgeId> {
        self.edges_of(ChangeKind::Remove).map(|c| &c.draft.id).collect()
    }
}

/// Stateless draft classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Classify one node draft
    #[must_use]
    pub fn classify_node(draft: &NodeDraft, repo: &GraphRepository) -> ChangeKind {
        match (repo.node(&draft.id), draft.tombstone) {
            (None, false) => ChangeKind::Add,
            (None, true) => ChangeKind::NoOp,
            (Some(_), true) => ChangeKind::Remove,
            (Some(node), false) => {
                if node.kind == draft.kind
                    && semantically_equal(&node.attributes, &draft.attributes)
                {
                    ChangeKind::NoOp
                } else {
                    ChangeKind::Modify
                }
            }
        }
    }

    /// Classify one edge draft
    #[must_use]
    pub fn classify_edge(draft: &EdgeDraft, repo: &GraphRepository) -> ChangeKind {
        match (repo.edge(&draft.id), draft.tombstone) {
            (None, false) => ChangeKind::Add,
            (None, true) => ChangeKind::NoOp,
            (Some(_), true) => ChangeKind::Remove,
            (Some(edge), false) => {
                if edge.kind == draft.kind
                    && edge.from_id == draft.from_id
                    && edge.to_id == draft.to_id
                    && semantically_equal(&edge.attributes, &draft.attributes)
                {
                    ChangeKind::NoOp
                } else {
                    ChangeKind::Modify
                }
            }
        }
    }

    /// Classify every draft of `workspace`
    #[must_use]
    pub fn diff(workspace: &Workspace, repo: &GraphRepository) -> ChangeSet {
        let mut set = ChangeSet::default();
        for draft in workspace.node_drafts() {
            match Self::classify_node(draft, repo) {
                ChangeKind::NoOp => set.unchanged += 1,
                kind => set.nodes.push(NodeChange {
                    kind,
                    draft: draft.clone(),
                }),
            }
        }
        for draft in workspace.edge_drafts() {
            match Self::classify_edge(draft, repo) {
                ChangeKind::NoOp => set.unchanged += 1,
                kind => set.edges.push(EdgeChange {
                    kind,
                    draft: draft.clone(),
                }),
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgraph_model::{Attributes, EdgeKind, EdgeSpec, NodeKind, NodeSpec, Stamp};
    use serde_json::json;

    fn repo() -> GraphRepository {
        let mut repo = GraphRepository::with_standard_schema("d");
        let stamp = Stamp::now("seed");
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!("Acme"));
        attrs.insert("meta".into(), json!({"b": 2, "a": 1}));
        repo.add_node(NodeSpec::new(NodeKind::Enterprise, attrs).with_id("ent"), &stamp)
            .unwrap();
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!("Pay"));
        repo.add_node(NodeSpec::new(NodeKind::Capability, attrs).with_id("cap"), &stamp)
            .unwrap();
        repo.add_edge(EdgeSpec::new(EdgeKind::Owns, "ent", "cap").with_id("owns"), &stamp)
            .unwrap();
        repo
    }

    #[test]
    fn untouched_copy_is_noop() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_existing_node(&repo, &NodeId::new("ent")).unwrap();
        ws.stage_existing_edge(&repo, &EdgeId::new("owns")).unwrap();
        let set = DiffEngine::diff(&ws, &repo);
        assert!(set.is_empty());
        assert_eq!(set.unchanged, 2);
    }

    #[test]
    fn key_order_is_not_a_change() {
        let repo = repo();
        let mut ws = Workspace::new();
        let mut attrs = Attributes::new();
        attrs.insert("meta".into(), json!({"a": 1, "b": 2}));
        attrs.insert("name".into(), json!("Acme"));
        ws.stage_node(NodeSpec::new(NodeKind::Enterprise, attrs).with_id("ent"))
            .unwrap();
        assert!(DiffEngine::diff(&ws, &repo).is_empty());
    }

    #[test]
    fn classifies_each_case() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_node(NodeSpec::new(NodeKind::Project, Attributes::new()).with_id("new"))
            .unwrap();
        ws.stage_existing_node(&repo, &NodeId::new("cap")).unwrap();
        let mut patch = Attributes::new();
        patch.insert("name".into(), json!("Payments"));
        ws.edit_node_attributes(&NodeId::new("cap"), &patch).unwrap();
        ws.stage_node_removal(&repo, &NodeId::new("ent")).unwrap();
        ws.stage_node(NodeSpec::new(NodeKind::Project, Attributes::new()).with_id("ghost"))
            .unwrap();
        ws.mark_node_for_removal(&NodeId::new("ghost")).unwrap();

        let set = DiffEngine::diff(&ws, &repo);
        let kinds: Vec<ChangeKind> = set.nodes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Modify, ChangeKind::Remove]);
        assert_eq!(set.unchanged, 1);
        assert_eq!(set.removed_node_ids(), vec![&NodeId::new("ent")]);
    }

    #[test]
    fn edge_retarget_is_modify() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_edge(EdgeSpec::new(EdgeKind::Owns, "ent", "other").with_id("owns"))
            .unwrap();
        let set = DiffEngine::diff(&ws, &repo);
        assert_eq!(set.edges[0].kind, ChangeKind::Modify);
    }
}
