//! Testing utilities for the archgraph workspace
//!
//! Shared fixtures: attribute builders and a seeded enterprise repository.

#![allow(missing_docs)]

use archgraph_model::{Attributes, EdgeKind, EdgeSpec, NodeKind, NodeSpec, SchemaRegistry};
use archgraph_repository::{RepositoryConfig, RepositoryHandle};
use serde_json::{json, Value};
use std::sync::Arc;

/// Id of the seeded enterprise
pub const ENTERPRISE_ID: &str = "ent-acme";
/// Id of the seeded department
pub const DEPARTMENT_ID: &str = "dept-finance";
/// Id of the seeded capability
pub const CAPABILITY_ID: &str = "cap-billing";
/// Id of the seeded application
pub const APPLICATION_ID: &str = "app-ledger";
/// Id of the seeded enterprise → capability ownership edge
pub const OWNS_CAPABILITY_ID: &str = "owns-billing";
/// Actor used for seeding
pub const SEED_ACTOR: &str = "seed";

pub fn attrs(pairs: &[(&str, Value)]) -> Attributes {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.clone()))
        .collect()
}

pub fn named(name: &str) -> Attributes {
    attrs(&[("name", json!(name))])
}

pub fn standard_schema() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::standard())
}

pub fn empty_handle() -> Arc<RepositoryHandle> {
    Arc::new(RepositoryHandle::open(
        RepositoryConfig::default().with_name("Acme"),
        standard_schema(),
    ))
}

/// Handle holding a small, valid enterprise model
///
/// `ent-acme` owns `dept-finance` and `cap-billing`; `dept-finance` owns
/// `app-ledger`, which supports `cap-billing`. Seeding publishes eight
/// direct edits, so the handle starts at revision 8.
pub fn enterprise_handle() -> Arc<RepositoryHandle> {
    let handle = empty_handle();
    seed_enterprise(&handle);
    handle
}

pub fn seed_enterprise(handle: &RepositoryHandle) {
    let nodes = [
        (ENTERPRISE_ID, NodeKind::Enterprise, "Acme"),
        (DEPARTMENT_ID, NodeKind::Department, "Finance"),
        (CAPABILITY_ID, NodeKind::Capability, "Billing"),
        (APPLICATION_ID, NodeKind::Application, "Ledger"),
    ];
    for (id, kind, name) in nodes {
        handle
            .add_node(NodeSpec::new(kind, named(name)).with_id(id), SEED_ACTOR)
            .unwrap();
    }
    let edges = [
        ("owns-finance", EdgeKind::Owns, ENTERPRISE_ID, DEPARTMENT_ID),
        (OWNS_CAPABILITY_ID, EdgeKind::Owns, ENTERPRISE_ID, CAPABILITY_ID),
        ("owns-ledger", EdgeKind::Owns, DEPARTMENT_ID, APPLICATION_ID),
        ("supports-billing", EdgeKind::Supports, APPLICATION_ID, CAPABILITY_ID),
    ];
    for (id, kind, from, to) in edges {
        handle
            .add_edge(EdgeSpec::new(kind, from, to).with_id(id), SEED_ACTOR)
            .unwrap();
    }
}

pub fn node_spec(kind: NodeKind, id: &str, name: &str) -> NodeSpec {
    NodeSpec::new(kind, named(name)).with_id(id)
}

pub fn edge_spec(kind: EdgeKind, id: &str, from: &str, to: &str) -> EdgeSpec {
    EdgeSpec::new(kind, from, to).with_id(id)
}
