//! Functional tests for permission-gated sessions.

use archgraph_governance::{
    Actor, ChainStage, GovernanceConfig, GovernanceMode, Permission, Role, Session,
    SessionError, ValidationMode, Workspace,
};
use archgraph_model::{EdgeKind, ErrorCode, NodeId, NodeKind, PatchMode};
use archgraph_repository::{BatchImport, ContextLock, ImportMode, RepositoryHandle};
use archgraph_test_utils::{
    edge_spec, empty_handle, enterprise_handle, named, node_spec, CAPABILITY_ID, ENTERPRISE_ID,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn session(handle: &Arc<RepositoryHandle>, role: Role) -> Session {
    Session::new(
        Arc::clone(handle),
        Actor::new(role.as_str(), role),
        GovernanceConfig::strict(),
    )
    .unwrap()
}

fn denied_at(err: &SessionError) -> ChainStage {
    match err {
        SessionError::PermissionDenied(denial) => denial.failed_at,
        other => panic!("expected a permission denial, got {other:?}"),
    }
}

#[test]
fn viewer_reads_but_never_writes() {
    let handle = enterprise_handle();
    let viewer = session(&handle, Role::Viewer);

    assert_eq!(viewer.read().unwrap().node_count(), 4);
    let err = viewer
        .add_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap_err();
    assert_eq!(denied_at(&err), ChainStage::RolePermission);
    assert_eq!(err.code(), Some(ErrorCode::PermissionDenied));
    assert_eq!(handle.current().unwrap().node_count(), 4);
}

#[test]
fn contributor_edits_but_cannot_commit() {
    let handle = enterprise_handle();
    let contributor = session(&handle, Role::Contributor);

    contributor
        .update_node_attributes(
            &NodeId::new(CAPABILITY_ID),
            &named("Invoicing"),
            PatchMode::Merge,
        )
        .unwrap();
    let mut ws = contributor.new_workspace();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    let err = contributor.commit(&mut ws).unwrap_err();
    assert_eq!(denied_at(&err), ChainStage::RolePermission);
    assert!(!err.is_recoverable());
}

#[test]
fn locked_context_allows_reads_only() {
    let handle = enterprise_handle();
    handle.set_context_lock(ContextLock::locked("viewing an older revision"));
    let owner = session(&handle, Role::Owner);

    assert!(owner.read().is_ok());
    let err = owner.delete_node(&NodeId::new(CAPABILITY_ID)).unwrap_err();
    assert_eq!(denied_at(&err), ChainStage::ContextLock);
    assert!(owner.undo().is_err());
}

#[test]
fn validate_reports_without_committing() {
    let handle = enterprise_handle();
    let architect = session(&handle, Role::Architect);
    let revision = handle.revision();

    let mut ws = architect.new_workspace();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    let report = architect.validate(&ws).unwrap();
    assert_eq!(report.mode, ValidationMode::Blocking);
    assert!(report.is_blocking());
    assert_eq!(handle.revision(), revision);
}

#[test]
fn import_requires_permission() {
    let handle = empty_handle();
    let batch: BatchImport = serde_json::from_value(json!({
        "objects": [
            { "id": "ent", "type": "Enterprise", "attributes": { "name": "Acme" } }
        ]
    }))
    .unwrap();

    let err = session(&handle, Role::Contributor)
        .import(&batch, ImportMode::CreateOnly)
        .unwrap_err();
    assert_eq!(denied_at(&err), ChainStage::RolePermission);

    let report = session(&handle, Role::Architect)
        .import(&batch, ImportMode::CreateOnly)
        .unwrap();
    assert_eq!(report.revision, Some(1));
}

#[test]
fn undo_and_redo_through_session() {
    let handle = enterprise_handle();
    let owner = session(&handle, Role::Owner);
    owner.delete_node(&NodeId::new(CAPABILITY_ID)).unwrap();
    assert!(!handle.current().unwrap().contains_node(&NodeId::new(CAPABILITY_ID)));

    owner.undo().unwrap();
    let repo = handle.current().unwrap();
    assert!(repo.contains_node(&NodeId::new(CAPABILITY_ID)));
    assert_eq!(repo.edge_count(), 4);

    owner.redo().unwrap();
    assert!(!handle.current().unwrap().contains_node(&NodeId::new(CAPABILITY_ID)));
}

#[test]
fn architect_commit_through_session() {
    let handle = enterprise_handle();
    let architect = session(&handle, Role::Architect);
    assert!(architect.authorize(Permission::Commit).is_ok());

    let mut ws = architect.new_workspace();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Owns, "owns-pay", ENTERPRISE_ID, "cap-pay"))
        .unwrap();
    let receipt = architect.commit(&mut ws).unwrap();
    assert_eq!(receipt.changes.nodes_added, vec![NodeId::new("cap-pay")]);
}

#[derive(Debug, Clone)]
enum Op {
    AddApp(u8),
    Depend(u8, u8),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::AddApp),
        (0u8..6, 0u8..6)
            .prop_filter("no self-dependency", |(a, b)| a != b)
            .prop_map(|(a, b)| Op::Depend(a, b)),
        (0u8..6).prop_map(Op::Remove),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// However commits interleave additions and removals, no committed
    /// edge ever references a missing node, and a staged edge to a node
    /// that exists nowhere refuses the whole commit.
    #[test]
    fn prop_commits_keep_referential_integrity(
        commits in proptest::collection::vec(proptest::collection::vec(op(), 1..6), 1..6)
    ) {
        let handle = empty_handle();
        let architect = Session::new(
            Arc::clone(&handle),
            Actor::new("alice", Role::Architect),
            GovernanceConfig::default().with_mode(GovernanceMode::Advisory),
        )
        .unwrap();

        for ops in commits {
            let repo = handle.current().unwrap();
            let mut ws = Workspace::new();
            for op in ops {
                let _ = match op {
                    Op::AddApp(i) => ws
                        .stage_node(node_spec(NodeKind::Application, &format!("app-{i}"), "App"))
                        .map(drop),
                    Op::Depend(a, b) => ws
                        .stage_edge(edge_spec(
                            EdgeKind::DependsOn,
                            &format!("dep-{a}-{b}"),
                            &format!("app-{a}"),
                            &format!("app-{b}"),
                        ))
                        .map(drop),
                    Op::Remove(i) => ws.stage_node_removal(&repo, &NodeId::new(format!("app-{i}"))),
                };
            }
            let resolves = |id: &NodeId| repo.contains_node(id) || ws.node_draft(id).is_some();
            let removed = |id: &NodeId| {
                repo.contains_node(id) && ws.node_draft(id).is_some_and(|d| d.tombstone)
            };
            // edges touching a removed node are skipped, not refused
            let dangling = ws.edge_drafts().any(|e| {
                !(removed(&e.from_id) || removed(&e.to_id))
                    && !(resolves(&e.from_id) && resolves(&e.to_id))
            });
            let before = handle.revision();
            match architect.commit(&mut ws) {
                Ok(_) => {
                    prop_assert!(!dangling);
                }
                Err(err) => {
                    prop_assert!(dangling);
                    prop_assert_eq!(err.code(), Some(ErrorCode::DanglingEndpoint));
                    prop_assert_eq!(handle.revision(), before);
                }
            }

            let after = handle.current().unwrap();
            for edge in after.edges() {
                prop_assert!(after.contains_node(&edge.from_id));
                prop_assert!(after.contains_node(&edge.to_id));
            }
        }
        prop_assert!(handle.audit().verify_integrity().is_ok());
    }
}
