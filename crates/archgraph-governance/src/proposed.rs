//! Post-commit view of a workspace over the committed graph
//!
//! [`ProposedGraph`] overlays staged drafts on the committed repository
//! without copying it. Staged nodes replace committed ones, tombstoned
//! entities disappear together with edges incident to removed nodes, and
//! staged edges appear only when both endpoints resolve to a permitted
//! pair; everything else stays as committed.

use crate::workspace::Workspace;
use archgraph_model::{Edge, EdgeId, Node, NodeId};
use archgraph_repository::GraphRepository;
use std::collections::BTreeMap;

/// Overlay of a workspace on the committed graph
#[derive(Debug, Clone)]
pub struct ProposedGraph<'a> {
    base: &'a GraphRepository,
    nodes: BTreeMap<NodeId, Option<Node>>,
    edges: BTreeMap<EdgeId, Option<Edge>>,
    cascaded: Vec<Edge>,
    invalidated: Vec<Edge>,
}

impl<'a> ProposedGraph<'a> {
    /// Build the view
    #[must_use]
    pub fn build(base: &'a GraphRepository, workspace: &Workspace) -> Self {
        let mut view = Self {
            base,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            cascaded: Vec::new(),
            invalidated: Vec::new(),
        };

        for draft in workspace.node_drafts() {
            let value = (!draft.tombstone).then(|| draft.to_node());
            view.nodes.insert(draft.id.clone(), value);
        }

        let removed: Vec<NodeId> = view
            .nodes
            .iter()
            .filter(|(id, value)| value.is_none() && base.contains_node(id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            for edge in base.incident_edges(id) {
                if view.edges.insert(edge.id.clone(), None).is_none() {
                    view.cascaded.push(edge.clone());
                }
            }
        }

        for draft in workspace.edge_drafts() {
            let edge = draft.to_edge();
            let value = (!draft.tombstone && view.admits(&edge)).then_some(edge);
            view.edges.insert(draft.id.clone(), value);
        }

        // committed edges a staged kind change would make illegal
        let retyped: Vec<NodeId> = workspace
            .node_drafts()
            .filter(|draft| !draft.tombstone)
            .filter(|draft| base.node(&draft.id).is_some_and(|node| node.kind != draft.kind))
            .map(|draft| draft.id.clone())
            .collect();
        for id in &retyped {
            for edge in base.incident_edges(id) {
                if view.edges.contains_key(&edge.id) || view.admits(edge) {
                    continue;
                }
                view.edges.insert(edge.id.clone(), None);
                view.invalidated.push(edge.clone());
            }
        }

        view
    }

    #[must_use]
    pub fn base(&self) -> &'a GraphRepository {
        self.base
    }

    /// Node as it would be after commit
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        match self.nodes.get(id) {
            Some(value) => value.as_ref(),
            None => self.base.node(id),
        }
    }

    /// Edge as it would be after commit
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        match self.edges.get(id) {
            Some(value) => value.as_ref(),
            None => self.base.edge(id),
        }
    }

    /// Whether a node would exist after commit
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Edges touching `node` after commit
    #[must_use]
    pub fn incident_edges(&self, node: &NodeId) -> Vec<&Edge> {
        let committed = self
            .base
            .incident_edges(node)
            .into_iter()
            .filter(|edge| !self.edges.contains_key(&edge.id));
        let staged = self
            .edges
            .values()
            .filter_map(Option::as_ref)
            .filter(|edge| edge.touches(node));
        committed.chain(staged).collect()
    }

    #[must_use]
    pub fn cascaded_edges(&self) -> &[Edge] {
        &self.cascaded
    }

    #[must_use]
    pub fn invalidated_edges(&self) -> &[Edge] {
        &self.invalidated
    }

    /// Whether `edge` resolves both endpoints to a permitted pair
    #[must_use]
    pub fn admits(&self, edge: &Edge) -> bool {
        match (self.node(&edge.from_id), self.node(&edge.to_id)) {
            (Some(from), Some(to)) => self.base.schema().permits(edge.kind, from.kind, to.kind),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgraph_model::{Attributes, EdgeKind, EdgeSpec, NodeKind, NodeSpec, Stamp};

    fn repo() -> GraphRepository {
        let mut repo = GraphRepository::with_standard_schema("p");
        let stamp = Stamp::now("seed");
        for (id, kind) in [("ent", NodeKind::Enterprise), ("cap", NodeKind::Capability)] {
            repo.add_node(NodeSpec::new(kind, Attributes::new()).with_id(id), &stamp)
                .unwrap();
        }
        repo.add_edge(EdgeSpec::new(EdgeKind::Owns, "ent", "cap").with_id("owns"), &stamp)
            .unwrap();
        repo
    }

    #[test]
    fn removed_node_cascades_in_view() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_node_removal(&repo, &NodeId::new("ent")).unwrap();

        let view = ProposedGraph::build(&repo, &ws);
        assert!(!view.contains_node(&NodeId::new("ent")));
        assert!(view.edge(&EdgeId::new("owns")).is_none());
        assert!(view.incident_edges(&NodeId::new("cap")).is_empty());
        assert_eq!(view.cascaded_edges().len(), 1);
        // the committed graph is untouched
        assert_eq!(repo.edge_count(), 1);
    }

    #[test]
    fn staged_edges_join_committed_ones() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_node(NodeSpec::new(NodeKind::Capability, Attributes::new()).with_id("cap2"))
            .unwrap();
        ws.stage_edge(EdgeSpec::new(EdgeKind::Owns, "ent", "cap2").with_id("owns2"))
            .unwrap();
        ws.stage_edge(EdgeSpec::new(EdgeKind::Owns, "ent", "ghost").with_id("dangling"))
            .unwrap();

        let view = ProposedGraph::build(&repo, &ws);
        assert_eq!(view.incident_edges(&NodeId::new("ent")).len(), 2);
        assert!(view.edge(&EdgeId::new("dangling")).is_none());
    }

    #[test]
    fn kind_change_invalidates_committed_edges() {
        let repo = repo();
        let mut ws = Workspace::new();
        ws.stage_node(NodeSpec::new(NodeKind::Project, Attributes::new()).with_id("cap"))
            .unwrap();
        let view = ProposedGraph::build(&repo, &ws);
        assert_eq!(view.invalidated_edges().len(), 1);
        assert!(view.incident_edges(&NodeId::new("ent")).is_empty());
    }
}
