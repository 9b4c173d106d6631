//! Committed node/edge graph
//!
//! [`GraphRepository`] stores its collections in persistent maps, so
//! `clone()` is O(1) and every clone is fully independent: mutating a
//! clone never affects the original or any snapshot taken from it. A
//! transaction is therefore "clone, mutate the clone, swap".

use crate::error::{EntityType, RepositoryError, Result};
use crate::snapshot::Snapshot;
use archgraph_model::{
    apply_patch, strip_bookkeeping, Attributes, Edge, EdgeId, EdgeKind, EdgeSpec, Node, NodeId,
    NodeKind, NodeSpec, PatchMode, SchemaRegistry, Stamp,
};
use chrono::{DateTime, Utc};
use im::{OrdMap, OrdSet};
use std::sync::Arc;

/// The committed architecture graph
#[derive(Debug, Clone)]
pub struct GraphRepository {
    name: String,
    description: Option<String>,
    revision: u64,
    updated_at: DateTime<Utc>,
    nodes: OrdMap<NodeId, Node>,
    edges: OrdMap<EdgeId, Edge>,
    incidence: OrdMap<NodeId, OrdSet<EdgeId>>,
    schema: Arc<SchemaRegistry>,
}

impl GraphRepository {
    /// Empty repository governed by `schema`
    #[must_use]
    pub fn new(name: impl Into<String>, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            name: name.into(),
            description: None,
            revision: 0,
            updated_at: Utc::now(),
            nodes: OrdMap::new(),
            edges: OrdMap::new(),
            incidence: OrdMap::new(),
            schema,
        }
    }

    /// Empty repository using the standard metamodel
    #[must_use]
    pub fn with_standard_schema(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(SchemaRegistry::standard()))
    }

    /// Repository name (recorded on audit events)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Published revision number
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Schema governing this repository
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    /// Look up a node
    #[inline]
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    #[must_use]
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    /// Whether a node exists
    #[inline]
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    #[must_use]
    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges with `node` as either endpoint
    #[must_use]
    pub fn incident_edges(&self, node: &NodeId) -> Vec<&Edge> {
        self.incidence
            .get(node)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    /// Edges pointing at `node`
    #[must_use]
    pub fn incoming(&self, node: &NodeId) -> Vec<&Edge> {
        self.incident_edges(node)
            .into_iter()
            .filter(|edge| &edge.to_id == node)
            .collect()
    }

    /// Edges leaving `node`
    #[must_use]
    pub fn outgoing(&self, node: &NodeId) -> Vec<&Edge> {
        self.incident_edges(node)
            .into_iter()
            .filter(|edge| &edge.from_id == node)
            .collect()
    }

    /// Add a node
    ///
    /// Caller-supplied bookkeeping attributes are discarded and replaced.
    ///
    /// # Errors
    /// `DuplicateId` if the id is taken.
    pub fn add_node(&mut self, spec: NodeSpec, stamp: &Stamp) -> Result<NodeId> {
        let id = spec.id.unwrap_or_else(NodeId::generate);
        if self.nodes.contains_key(&id) {
            return Err(RepositoryError::DuplicateId {
                entity: EntityType::Node,
                id: id.to_string(),
            });
        }

        let mut attributes = strip_bookkeeping(&spec.attributes);
        stamp.mark_created(&mut attributes);
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                kind: spec.kind,
                attributes,
            },
        );
        self.touch(stamp);
        Ok(id)
    }

    /// Add an edge
    ///
    /// # Errors
    /// `DuplicateId`, `DanglingEndpoint` or `InvalidEndpointTypes`.
    pub fn add_edge(&mut self, spec: EdgeSpec, stamp: &Stamp) -> Result<EdgeId> {
        let id = spec.id.unwrap_or_else(EdgeId::generate);
        if self.edges.contains_key(&id) {
            return Err(RepositoryError::DuplicateId {
                entity: EntityType::Edge,
                id: id.to_string(),
            });
        }
        self.check_endpoints(&id, spec.kind, &spec.from_id, &spec.to_id)?;

        let mut attributes = strip_bookkeeping(&spec.attributes);
        stamp.mark_created(&mut attributes);
        self.link(Edge {
            id: id.clone(),
            kind: spec.kind,
            from_id: spec.from_id,
            to_id: spec.to_id,
            attributes,
        });
        self.touch(stamp);
        Ok(id)
    }

    /// Patch a node's attributes
    ///
    /// # Errors
    /// `NotFound` if the node does not exist.
    pub fn update_node_attributes(
        &mut self,
        id: &NodeId,
        patch: &Attributes,
        mode: PatchMode,
        stamp: &Stamp,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RepositoryError::node_not_found(id))?;
        apply_patch(&mut node.attributes, patch, mode);
        stamp.mark_modified(&mut node.attributes);
        self.touch(stamp);
        Ok(())
    }

    /// Patch an edge's attributes
    ///
    /// # Errors
    /// `NotFound` if the edge does not exist.
    pub fn update_edge_attributes(
        &mut self,
        id: &EdgeId,
        patch: &Attributes,
        mode: PatchMode,
        stamp: &Stamp,
    ) -> Result<()> {
        let edge = self.edges.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: EntityType::Edge,
            id: id.to_string(),
        })?;
        apply_patch(&mut edge.attributes, patch, mode);
        stamp.mark_modified(&mut edge.attributes);
        self.touch(stamp);
        Ok(())
    }

    /// Replace a node's kind and semantic attributes
    ///
    /// A kind change must keep every incident edge legal.
    ///
    /// # Errors
    /// `NotFound`, or `InvalidEndpointTypes` for an incident edge the new
    /// kind would invalidate.
    pub fn modify_node(
        &mut self,
        id: &NodeId,
        kind: NodeKind,
        attributes: &Attributes,
        stamp: &Stamp,
    ) -> Result<()> {
        let current = self
            .nodes
            .get(id)
            .ok_or_else(|| RepositoryError::node_not_found(id))?;
        if current.kind != kind {
            for edge in self.incident_edges(id) {
                let from = if &edge.from_id == id { kind } else { self.kind_of(&edge.from_id)? };
                let to = if &edge.to_id == id { kind } else { self.kind_of(&edge.to_id)? };
                self.check_kinds(edge, from, to)?;
            }
        }
        self.modify_node_deferred(id, kind, attributes, stamp)
    }

    /// [`modify_node`](Self::modify_node) without the incident edge check
    ///
    /// For multi-entity writes that retype a node and its edges together.
    /// The caller runs [`verify_incident_edges`](Self::verify_incident_edges)
    /// once every related edge change is applied.
    ///
    /// # Errors
    /// `NotFound`.
    pub fn modify_node_deferred(
        &mut self,
        id: &NodeId,
        kind: NodeKind,
        attributes: &Attributes,
        stamp: &Stamp,
    ) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RepositoryError::node_not_found(id))?;
        node.kind = kind;
        apply_patch(&mut node.attributes, attributes, PatchMode::Replace);
        stamp.mark_modified(&mut node.attributes);
        self.touch(stamp);
        Ok(())
    }

    /// Check every edge touching `id` against the current node kinds
    ///
    /// # Errors
    /// `NotFound` for an unknown node, `InvalidEndpointTypes` for the first
    /// illegal edge.
    pub fn verify_incident_edges(&self, id: &NodeId) -> Result<()> {
        if !self.contains_node(id) {
            return Err(RepositoryError::node_not_found(id));
        }
        for edge in self.incident_edges(id) {
            let from = self.kind_of(&edge.from_id)?;
            let to = self.kind_of(&edge.to_id)?;
            self.check_kinds(edge, from, to)?;
        }
        Ok(())
    }

    /// Replace an edge's kind, endpoints and semantic attributes
    ///
    /// # Errors
    /// `NotFound`, `DanglingEndpoint` or `InvalidEndpointTypes`.
    pub fn modify_edge(
        &mut self,
        id: &EdgeId,
        kind: EdgeKind,
        from_id: &NodeId,
        to_id: &NodeId,
        attributes: &Attributes,
        stamp: &Stamp,
    ) -> Result<()> {
        let mut edge = self
            .edges
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: EntityType::Edge,
                id: id.to_string(),
            })?;
        self.check_endpoints(id, kind, from_id, to_id)?;

        self.unlink(&edge);
        edge.kind = kind;
        edge.from_id = from_id.clone();
        edge.to_id = to_id.clone();
        apply_patch(&mut edge.attributes, attributes, PatchMode::Replace);
        stamp.mark_modified(&mut edge.attributes);
        self.link(edge);
        self.touch(stamp);
        Ok(())
    }

    /// Delete a node and every incident edge
    ///
    /// Returns the cascaded edges.
    ///
    /// # Errors
    /// `NotFound` if the node does not exist.
    pub fn delete_node(&mut self, id: &NodeId, stamp: &Stamp) -> Result<Vec<Edge>> {
        if !self.nodes.contains_key(id) {
            return Err(RepositoryError::node_not_found(id));
        }
        let cascaded: Vec<Edge> = self.incident_edges(id).into_iter().cloned().collect();
        for edge in &cascaded {
            self.unlink(edge);
        }
        self.nodes.remove(id);
        self.incidence.remove(id);
        self.touch(stamp);
        Ok(cascaded)
    }

    /// Delete an edge
    ///
    /// # Errors
    /// `NotFound` if the edge does not exist.
    pub fn delete_edge(&mut self, id: &EdgeId, stamp: &Stamp) -> Result<Edge> {
        let edge = self
            .edges
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: EntityType::Edge,
                id: id.to_string(),
            })?;
        self.unlink(&edge);
        self.touch(stamp);
        Ok(edge)
    }

    /// Immutable point-in-time copy of the collections
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.revision,
            self.updated_at,
            self.nodes.clone(),
            self.edges.clone(),
            self.incidence.clone(),
        )
    }

    /// Replace the collections with those of `snapshot`
    ///
    /// The revision counter is not rewound; the caller publishes a new one.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        let (nodes, edges, incidence) = snapshot.collections();
        self.nodes = nodes;
        self.edges = edges;
        self.incidence = incidence;
        self.updated_at = Utc::now();
    }

    /// Advance the revision counter; returns the new revision
    pub fn advance_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: u64, updated_at: DateTime<Utc>) {
        self.revision = revision;
        self.updated_at = updated_at;
    }

    /// Insert a node verbatim, keeping its bookkeeping (snapshot load)
    pub(crate) fn load_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(RepositoryError::DuplicateId {
                entity: EntityType::Node,
                id: node.id.to_string(),
            });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert an edge verbatim, keeping its bookkeeping (snapshot load)
    pub(crate) fn load_edge(&mut self, edge: Edge) -> Result<()> {
        if self.edges.contains_key(&edge.id) {
            return Err(RepositoryError::DuplicateId {
                entity: EntityType::Edge,
                id: edge.id.to_string(),
            });
        }
        self.check_endpoints(&edge.id, edge.kind, &edge.from_id, &edge.to_id)?;
        self.link(edge);
        Ok(())
    }

    fn kind_of(&self, id: &NodeId) -> Result<NodeKind> {
        self.nodes
            .get(id)
            .map(|node| node.kind)
            .ok_or_else(|| RepositoryError::node_not_found(id))
    }

    fn check_endpoints(
        &self,
        edge: &EdgeId,
        kind: EdgeKind,
        from_id: &NodeId,
        to_id: &NodeId,
    ) -> Result<()> {
        let endpoint_kind = |id: &NodeId| {
            self.kind_of(id).map_err(|_| RepositoryError::DanglingEndpoint {
                edge: edge.to_string(),
                missing: id.clone(),
            })
        };
        let from = endpoint_kind(from_id)?;
        let to = endpoint_kind(to_id)?;
        if !self.schema.permits(kind, from, to) {
            return Err(RepositoryError::InvalidEndpointTypes {
                edge: edge.to_string(),
                kind,
                from,
                to,
            });
        }
        Ok(())
    }

    fn check_kinds(&self, edge: &Edge, from: NodeKind, to: NodeKind) -> Result<()> {
        if self.schema.permits(edge.kind, from, to) {
            Ok(())
        } else {
            Err(RepositoryError::InvalidEndpointTypes {
                edge: edge.id.to_string(),
                kind: edge.kind,
                from,
                to,
            })
        }
    }

    fn link(&mut self, edge: Edge) {
        for endpoint in [&edge.from_id, &edge.to_id] {
            self.incidence
                .entry(endpoint.clone())
                .or_insert_with(OrdSet::new)
                .insert(edge.id.clone());
        }
        self.edges.insert(edge.id.clone(), edge);
    }

    fn unlink(&mut self, edge: &Edge) {
        for endpoint in [&edge.from_id, &edge.to_id] {
            if let Some(ids) = self.incidence.get_mut(endpoint) {
                ids.remove(&edge.id);
            }
        }
        self.edges.remove(&edge.id);
    }

    fn touch(&mut self, stamp: &Stamp) {
        self.updated_at = stamp.at;
    }
}
