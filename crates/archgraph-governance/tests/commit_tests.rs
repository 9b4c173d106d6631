//! Functional tests for governed commits.
//!
//! Exercises the full stage → validate → diff → apply → swap → audit path
//! against a live handle, including every refusal path.

use archgraph_governance::{
    Actor, ChainStage, CommitCoordinator, CommitError, FindingCategory, GovernanceConfig,
    GovernanceMode, Role, Severity, Workspace, WorkspaceStatus,
};
use archgraph_model::{EdgeId, EdgeKind, ErrorCode, NodeId, NodeKind};
use archgraph_repository::{
    AuditAction, ChangeCause, ContextLock, RepositoryError, RepositoryEvent, RepositoryHandle,
};
use archgraph_test_utils::{
    attrs, edge_spec, empty_handle, enterprise_handle, node_spec, APPLICATION_ID, CAPABILITY_ID,
    ENTERPRISE_ID, OWNS_CAPABILITY_ID,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn architect() -> Actor {
    Actor::new("alice", Role::Architect)
}

fn coordinator(handle: &RepositoryHandle, mode: GovernanceMode) -> CommitCoordinator {
    CommitCoordinator::for_handle(handle, GovernanceConfig::default().with_mode(mode)).unwrap()
}

fn handle_with_enterprise() -> Arc<RepositoryHandle> {
    let handle = empty_handle();
    handle
        .add_node(node_spec(NodeKind::Enterprise, "ent", "Acme"), "seed")
        .unwrap();
    handle
}

/// A new Capability with no owner is refused with exactly one
/// cardinality finding, and nothing reaches the repository.
#[test]
fn unowned_capability_is_refused() {
    let handle = handle_with_enterprise();
    let before = handle.snapshot_document().unwrap();
    let audit_before = handle.audit().len();

    let mut ws = Workspace::new();
    let cap = ws
        .stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();

    let err = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap_err();

    assert_eq!(err.findings().len(), 1);
    let violations: Vec<_> = err
        .findings()
        .iter()
        .filter(|f| f.category == FindingCategory::CardinalityViolation)
        .collect();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].subject_id, cap.as_str());
    assert_eq!(violations[0].severity, Severity::Error);
    assert_eq!(err.code(), Some(ErrorCode::GovernanceBlocked));

    assert_eq!(handle.snapshot_document().unwrap(), before);
    assert_eq!(handle.audit().len(), audit_before);
    assert_eq!(ws.status(), WorkspaceStatus::Draft);
}

/// The same Capability plus an OWNS edge from the Enterprise commits:
/// one node, one edge, two per-item audit events and one summary.
#[test]
fn owned_capability_commits() {
    let handle = handle_with_enterprise();
    let audit_before = handle.audit().len();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Owns, "owns-pay", "ent", "cap-pay"))
        .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();

    let repo = handle.current().unwrap();
    assert_eq!(repo.node_count(), 2);
    assert_eq!(repo.edge_count(), 1);
    assert_eq!(receipt.changes.len(), 2);
    assert_eq!(receipt.revision, Some(2));

    let added: Vec<AuditAction> = handle
        .audit()
        .events_since(audit_before as u64)
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        added,
        vec![AuditAction::NodeAdded, AuditAction::EdgeAdded, AuditAction::CommitApplied]
    );
    assert!(handle.audit().verify_integrity().is_ok());
    assert_eq!(ws.status(), WorkspaceStatus::Committed);
}

/// Drafts identical to the committed graph change nothing.
#[test]
fn noop_commit_is_idempotent() {
    let handle = enterprise_handle();
    let repo = handle.current().unwrap();
    let revision = handle.revision();
    let audit_before = handle.audit().len();

    let mut ws = Workspace::new();
    ws.stage_existing_node(&repo, &NodeId::new(CAPABILITY_ID)).unwrap();
    ws.stage_existing_edge(&repo, &EdgeId::new(OWNS_CAPABILITY_ID))
        .unwrap();
    // re-staging the same values is still a no-op
    ws.stage_node(node_spec(NodeKind::Enterprise, ENTERPRISE_ID, "Acme"))
        .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();

    assert_eq!(receipt.revision, None);
    assert_eq!(receipt.unchanged, 3);
    assert_eq!(handle.revision(), revision);
    assert_eq!(handle.audit().len(), audit_before);
    assert_eq!(ws.status(), WorkspaceStatus::Committed);
}

/// Removing a node removes its incident edges in the same commit and
/// audits each of them.
#[test]
fn node_removal_cascades_in_commit() {
    let handle = enterprise_handle();
    let repo = handle.current().unwrap();
    let incident = repo.incident_edges(&NodeId::new(CAPABILITY_ID)).len();

    let mut ws = Workspace::new();
    ws.stage_node_removal(&repo, &NodeId::new(CAPABILITY_ID))
        .unwrap();
    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();

    let after = handle.current().unwrap();
    assert!(!after.contains_node(&NodeId::new(CAPABILITY_ID)));
    assert_eq!(receipt.changes.edges_removed.len(), incident);
    for edge in after.edges() {
        assert!(after.contains_node(&edge.from_id) && after.contains_node(&edge.to_id));
    }
    let removed = handle
        .audit()
        .events()
        .iter()
        .filter(|e| e.action == AuditAction::EdgeRemoved)
        .count();
    assert_eq!(removed, incident);
}

/// A locked context denies even an Owner under strict governance, at
/// the first stage.
#[test]
fn locked_context_denies_before_role() {
    let handle = handle_with_enterprise();
    handle.set_context_lock(ContextLock::locked("viewing revision 1"));

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    let err = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &Actor::new("root", Role::Owner))
        .unwrap_err();

    let denial = match err {
        CommitError::PermissionDenied(denial) => denial,
        other => panic!("expected a permission denial, got {other:?}"),
    };
    assert_eq!(denial.failed_at, ChainStage::ContextLock);
    assert_eq!(denial.evaluated, vec![ChainStage::ContextLock]);
}

/// Contributors may stage but not commit.
#[test]
fn contributor_cannot_commit() {
    let handle = handle_with_enterprise();
    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    let err = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &Actor::new("bob", Role::Contributor))
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PermissionDenied));
    assert!(!err.is_recoverable());
}

/// Advisory governance lets findings through as warnings.
#[test]
fn advisory_mode_commits_with_warnings() {
    let handle = handle_with_enterprise();
    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap();
    assert_eq!(receipt.findings.len(), 1);
    assert_eq!(receipt.findings[0].severity, Severity::Warning);
    assert!(handle.current().unwrap().contains_node(&NodeId::new("cap-pay")));
}

/// Iterative workspaces commit under strict governance too.
#[test]
fn iterative_workspace_is_advisory() {
    let handle = handle_with_enterprise();
    let mut ws = Workspace::new().iterative();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();
    assert!(receipt.findings.iter().all(|f| !f.is_blocking()));
}

/// A mutation failing on the clone aborts without touching anything.
#[test]
fn apply_failure_leaves_repository_untouched() {
    let handle = handle_with_enterprise();
    let before = handle.snapshot_document().unwrap();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Project, "proj", "Migration"))
        .unwrap();
    // OWNS never connects Project -> Enterprise; advisory mode lets it reach apply
    ws.stage_edge(edge_spec(EdgeKind::Owns, "bad", "proj", "ent"))
        .unwrap();

    let err = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap_err();
    assert!(matches!(err, CommitError::Apply { .. }));
    assert_eq!(err.code(), Some(ErrorCode::InvalidEndpointTypes));
    assert_eq!(handle.snapshot_document().unwrap(), before);
    assert_eq!(ws.status(), WorkspaceStatus::Draft);
}

/// Staged edges pointing at a node removed in the same commit are skipped.
#[test]
fn edge_to_removed_node_is_skipped() {
    let handle = enterprise_handle();
    let repo = handle.current().unwrap();

    let mut ws = Workspace::new();
    ws.stage_node_removal(&repo, &NodeId::new(CAPABILITY_ID))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Owns, "owns-again", ENTERPRISE_ID, CAPABILITY_ID))
        .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap();
    assert_eq!(receipt.skipped_edges, vec![EdgeId::new("owns-again")]);
    assert!(!handle.current().unwrap().contains_edge(&EdgeId::new("owns-again")));
}

/// An edge to a node that exists nowhere aborts the whole commit.
#[test]
fn edge_to_unknown_node_aborts() {
    let handle = handle_with_enterprise();
    let before = handle.snapshot_document().unwrap();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Governs, "g", "p", "ghost"))
        .unwrap();

    let err = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap_err();
    match &err {
        CommitError::Apply {
            source: RepositoryError::DanglingEndpoint { missing, .. },
        } => assert_eq!(missing.as_str(), "ghost"),
        other => panic!("expected a dangling endpoint, got {other:?}"),
    }
    assert_eq!(err.code(), Some(ErrorCode::DanglingEndpoint));
    assert_eq!(handle.snapshot_document().unwrap(), before);
    assert!(!handle.current().unwrap().contains_node(&NodeId::new("p")));
    assert_eq!(ws.status(), WorkspaceStatus::Draft);
}

fn realized_service_handle() -> Arc<RepositoryHandle> {
    let handle = empty_handle();
    handle
        .add_node(node_spec(NodeKind::Application, "a", "Ledger"), "seed")
        .unwrap();
    handle
        .add_node(node_spec(NodeKind::ApplicationService, "s", "Posting"), "seed")
        .unwrap();
    handle
        .add_edge(edge_spec(EdgeKind::Realizes, "r", "a", "s"), "seed")
        .unwrap();
    handle
}

/// A kind change commits when the same workspace retypes the edge the
/// old kind relied on.
#[test]
fn kind_change_with_edge_retype_commits() {
    let handle = realized_service_handle();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Technology, "a", "Ledger"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::DependsOn, "r", "a", "s"))
        .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();
    assert_eq!(receipt.changes.nodes_modified, vec![NodeId::new("a")]);
    assert_eq!(receipt.changes.edges_modified, vec![EdgeId::new("r")]);

    let repo = handle.current().unwrap();
    assert_eq!(repo.node(&NodeId::new("a")).unwrap().kind, NodeKind::Technology);
    assert_eq!(repo.edge(&EdgeId::new("r")).unwrap().kind, EdgeKind::DependsOn);
}

/// A kind change that strands an untouched edge still fails at apply.
#[test]
fn kind_change_stranding_an_edge_aborts() {
    let handle = realized_service_handle();
    let before = handle.snapshot_document().unwrap();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Technology, "a", "Ledger"))
        .unwrap();

    let err = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvalidEndpointTypes));
    assert_eq!(handle.snapshot_document().unwrap(), before);
}

/// Edge attribute edits and retargets are receipted, audited and
/// announced as modifications.
#[test]
fn edge_modifications_are_recorded() {
    let handle = enterprise_handle();
    let repo = handle.current().unwrap();
    let audit_before = handle.audit().len();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    handle.subscribe(move |event| sink.lock().push(event.clone()));

    let mut ws = Workspace::new();
    ws.stage_existing_edge(&repo, &EdgeId::new(OWNS_CAPABILITY_ID))
        .unwrap();
    ws.edit_edge_attributes(
        &EdgeId::new(OWNS_CAPABILITY_ID),
        &attrs(&[("since", json!("2024"))]),
    )
    .unwrap();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Owns, "owns-pay", ENTERPRISE_ID, "cap-pay"))
        .unwrap();
    ws.stage_edge(edge_spec(
        EdgeKind::Supports,
        "supports-billing",
        APPLICATION_ID,
        "cap-pay",
    ))
    .unwrap();

    let receipt = coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();

    let mut modified = receipt.changes.edges_modified.clone();
    modified.sort();
    assert_eq!(
        modified,
        vec![EdgeId::new(OWNS_CAPABILITY_ID), EdgeId::new("supports-billing")]
    );
    assert_eq!(receipt.changes.edges_added, vec![EdgeId::new("owns-pay")]);

    let after = handle.current().unwrap();
    assert_eq!(
        after.edge(&EdgeId::new(OWNS_CAPABILITY_ID)).unwrap().attributes["since"],
        json!("2024")
    );
    let retargeted = after.edge(&EdgeId::new("supports-billing")).unwrap();
    assert_eq!(retargeted.to_id, NodeId::new("cap-pay"));
    assert!(after
        .incoming(&NodeId::new(CAPABILITY_ID))
        .iter()
        .all(|e| e.kind != EdgeKind::Supports));

    let audited = handle.audit().events_since(audit_before as u64);
    let mut subjects: Vec<&str> = audited
        .iter()
        .filter(|e| e.action == AuditAction::EdgeModified)
        .map(|e| e.subject.as_str())
        .collect();
    subjects.sort_unstable();
    assert_eq!(subjects, vec![OWNS_CAPABILITY_ID, "supports-billing"]);
    assert!(handle.audit().verify_integrity().is_ok());

    let events = events.lock();
    assert_eq!(events.len(), 1);
    let RepositoryEvent::Mutated { cause, changes, revision, .. } = &events[0] else {
        panic!("expected a mutation event");
    };
    assert_eq!(Some(*revision), receipt.revision);
    assert_eq!(
        cause,
        &ChangeCause::Commit {
            workspace: ws.id().to_string()
        }
    );
    assert_eq!(changes.edges_modified.len(), 2);
}

/// Only one writer at a time; the loser gets `CommitInProgress`.
#[test]
fn concurrent_commit_is_refused() {
    let handle = handle_with_enterprise();
    let _writer = handle.begin_write().unwrap();

    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    let err = coordinator(&handle, GovernanceMode::Advisory)
        .commit(&mut ws, &handle, &architect())
        .unwrap_err();
    assert!(matches!(
        err,
        CommitError::Repository(RepositoryError::CommitInProgress)
    ));
    assert!(err.is_recoverable());
}

/// Terminal workspaces cannot be committed again.
#[test]
fn committed_workspace_is_closed() {
    let handle = handle_with_enterprise();
    let coordinator = coordinator(&handle, GovernanceMode::Advisory);
    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Principle, "p", "Cloud first"))
        .unwrap();
    coordinator.commit(&mut ws, &handle, &architect()).unwrap();

    assert!(matches!(
        coordinator.commit(&mut ws, &handle, &architect()),
        Err(CommitError::WorkspaceClosed { .. })
    ));
    assert!(ws.stage_node(node_spec(NodeKind::Principle, "q", "Buy before build")).is_err());
}

/// Committed changes can be undone as one step.
#[test]
fn commit_is_one_undo_step() {
    let handle = handle_with_enterprise();
    let mut ws = Workspace::new();
    ws.stage_node(node_spec(NodeKind::Capability, "cap-pay", "Payments"))
        .unwrap();
    ws.stage_edge(edge_spec(EdgeKind::Owns, "owns-pay", "ent", "cap-pay"))
        .unwrap();
    coordinator(&handle, GovernanceMode::Strict)
        .commit(&mut ws, &handle, &architect())
        .unwrap();

    handle.undo("alice").unwrap();
    let repo = handle.current().unwrap();
    assert_eq!(repo.node_count(), 1);
    assert_eq!(repo.edge_count(), 0);
    assert_eq!(repo.node(&NodeId::new("ent")).unwrap().name(), Some("Acme"));
}
