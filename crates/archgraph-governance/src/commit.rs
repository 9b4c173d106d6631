//! All-or-nothing commit of a workspace
//!
//! [`CommitCoordinator::commit`] runs permission → single-writer guard →
//! validation → diff → clone-and-apply → swap. Any failure before the swap
//! leaves both the repository and the workspace exactly as they were.

use crate::config::GovernanceConfig;
use crate::diff::{ChangeKind, ChangeSet, DiffEngine};
use crate::error::CommitError;
use crate::permission::{Actor, Permission, PermissionChain};
use crate::validation::{Finding, ValidationPipeline};
use crate::workspace::{Workspace, WorkspaceStatus};
use archgraph_model::{EdgeId, EdgeSpec, NodeId, NodeSpec, Stamp};
use archgraph_repository::{
    AuditAction, AuditRecord, ChangeCause, ChangeSummary, GraphRepository, RepositoryError,
    RepositoryHandle,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Committed workspace
    pub workspace_id: String,
    /// Published revision; `None` when nothing changed
    pub revision: Option<u64>,
    /// Applied changes, cascaded edge removals included
    pub changes: ChangeSummary,
    /// Staged edges skipped because the same commit removes an endpoint
    pub skipped_edges: Vec<EdgeId>,
    /// Drafts identical to the committed graph
    pub unchanged: usize,
    /// Non-blocking findings reported during validation
    pub findings: Vec<Finding>,
}

/// Orchestrates validated commits
#[derive(Debug, Clone)]
pub struct CommitCoordinator {
    pipeline: ValidationPipeline,
    chain: PermissionChain,
    governance: GovernanceConfig,
}

impl CommitCoordinator {
    /// Coordinator validating against `schema`
    #[must_use]
    pub fn new(schema: Arc<archgraph_model::SchemaRegistry>, governance: GovernanceConfig) -> Self {
        Self {
            pipeline: ValidationPipeline::new(schema),
            chain: PermissionChain::new(),
            governance,
        }
    }

    /// Coordinator using the handle's own schema
    ///
    /// # Errors
    /// `HandleClosed` after close.
    pub fn for_handle(
        handle: &RepositoryHandle,
        governance: GovernanceConfig,
    ) -> Result<Self, RepositoryError> {
        Ok(Self::new(handle.current()?.schema().clone(), governance))
    }

    #[must_use]
    pub fn governance(&self) -> &GovernanceConfig {
        &self.governance
    }

    #[must_use]
    pub fn pipeline(&self) -> &ValidationPipeline {
        &self.pipeline
    }

    /// Merge `workspace` into the repository behind `handle`
    ///
    /// # Errors
    /// `WorkspaceClosed`, `PermissionDenied`, `Repository` (closed handle,
    /// locked context, concurrent writer), `GovernanceBlocked` with the
    /// full finding list, or `Apply` when a change fails on the clone.
    pub fn commit(
        &self,
        workspace: &mut Workspace,
        handle: &RepositoryHandle,
        actor: &Actor,
    ) -> Result<CommitReceipt, CommitError> {
        if workspace.status() != WorkspaceStatus::Draft {
            return Err(CommitError::WorkspaceClosed {
                id: workspace.id().to_string(),
                status: workspace.status(),
            });
        }

        let authorization = self.chain.enforce(
            &handle.context_lock(),
            actor.role,
            Permission::Commit,
            self.governance.mode,
        )?;
        let guard = handle.begin_write()?;
        let base = Arc::clone(guard.base());
        tracing::info!(
            repository = handle.name(),
            workspace = workspace.id(),
            actor = %actor.name,
            drafts = workspace.len(),
            "commit started"
        );

        let report = self.pipeline.validate(workspace, &base, authorization.mode);
        if report.is_blocking() {
            tracing::warn!(
                repository = handle.name(),
                workspace = workspace.id(),
                blocking = report.blocking().count(),
                "commit refused by validation"
            );
            return Err(CommitError::GovernanceBlocked {
                findings: report.findings,
            });
        }

        let change_set = DiffEngine::diff(workspace, &base);
        if change_set.is_empty() {
            drop(guard);
            workspace.mark_committed();
            tracing::info!(
                repository = handle.name(),
                workspace = workspace.id(),
                unchanged = change_set.unchanged,
                "commit had nothing to apply"
            );
            return Ok(CommitReceipt {
                workspace_id: workspace.id().to_string(),
                revision: None,
                changes: ChangeSummary::default(),
                skipped_edges: Vec::new(),
                unchanged: change_set.unchanged,
                findings: report.findings,
            });
        }

        let stamp = Stamp::now(actor.name.clone());
        let mut next = (*base).clone();
        let applied = apply_changes(&mut next, &change_set, &stamp).map_err(|source| {
            tracing::warn!(
                repository = handle.name(),
                workspace = workspace.id(),
                error = %source,
                "commit aborted while applying"
            );
            CommitError::Apply { source }
        })?;

        let mut records = AuditRecord::for_changes(&actor.name, &applied.changes);
        records.push(
            AuditRecord::new(&actor.name, AuditAction::CommitApplied, workspace.id())
                .with_detail(applied.changes.to_string()),
        );
        let revision = guard.publish(
            next,
            &stamp,
            ChangeCause::Commit {
                workspace: workspace.id().to_string(),
            },
            applied.changes.clone(),
            records,
        );
        workspace.mark_committed();
        tracing::info!(
            repository = handle.name(),
            workspace = workspace.id(),
            revision,
            changes = %applied.changes,
            skipped = applied.skipped.len(),
            "commit applied"
        );

        Ok(CommitReceipt {
            workspace_id: workspace.id().to_string(),
            revision: Some(revision),
            changes: applied.changes,
            skipped_edges: applied.skipped,
            unchanged: change_set.unchanged,
            findings: report.findings,
        })
    }
}

/// Result of applying a change set to a clone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Touched ids
    pub changes: ChangeSummary,
    /// Staged edges skipped because an endpoint is removed by the same change set
    pub skipped: Vec<EdgeId>,
}

/// Apply `set` to `repo` in commit order
///
/// Edges incident to removed nodes go first, then node removals,
/// modifications and additions, then edge modifications, additions and
/// removals. Node kind changes are checked against their incident edges
/// only after every edge change is in place. A staged edge is skipped when
/// an endpoint is removed by `set`; any other missing endpoint fails.
///
/// # Errors
/// The first failing mutation; `repo` is then partially modified and must
/// be discarded.
pub fn apply_changes(
    repo: &mut GraphRepository,
    set: &ChangeSet,
    stamp: &Stamp,
) -> Result<AppliedChanges, RepositoryError> {
    let mut out = AppliedChanges::default();
    let changes = &mut out.changes;
    let removed: HashSet<&NodeId> = set.removed_node_ids().into_iter().collect();

    for id in &removed {
        let incident: Vec<EdgeId> = repo.incident_edges(id).iter().map(|e| e.id.clone()).collect();
        for edge in incident {
            repo.delete_edge(&edge, stamp)?;
            changes.edges_removed.push(edge);
        }
    }

    for change in set.nodes_of(ChangeKind::Remove) {
        repo.delete_node(&change.draft.id, stamp)?;
        changes.nodes_removed.push(change.draft.id.clone());
    }
    let mut retyped = Vec::new();
    for change in set.nodes_of(ChangeKind::Modify) {
        let draft = &change.draft;
        if repo.node(&draft.id).is_some_and(|node| node.kind != draft.kind) {
            retyped.push(&draft.id);
        }
        repo.modify_node_deferred(&draft.id, draft.kind, &draft.attributes, stamp)?;
        changes.nodes_modified.push(draft.id.clone());
    }
    for change in set.nodes_of(ChangeKind::Add) {
        let draft = &change.draft;
        let spec = NodeSpec::new(draft.kind, draft.attributes.clone()).with_id(draft.id.clone());
        changes.nodes_added.push(repo.add_node(spec, stamp)?);
    }

    for change in set.edges_of(ChangeKind::Modify) {
        let draft = &change.draft;
        if touches_removed(&removed, &draft.from_id, &draft.to_id)
            || !repo.contains_edge(&draft.id)
        {
            // cascaded away with a removed endpoint
            out.skipped.push(draft.id.clone());
            continue;
        }
        repo.modify_edge(
            &draft.id,
            draft.kind,
            &draft.from_id,
            &draft.to_id,
            &draft.attributes,
            stamp,
        )?;
        changes.edges_modified.push(draft.id.clone());
    }
    for change in set.edges_of(ChangeKind::Add) {
        let draft = &change.draft;
        if touches_removed(&removed, &draft.from_id, &draft.to_id) {
            out.skipped.push(draft.id.clone());
            continue;
        }
        let spec = EdgeSpec::new(draft.kind, draft.from_id.clone(), draft.to_id.clone())
            .with_id(draft.id.clone())
            .with_attributes(draft.attributes.clone());
        changes.edges_added.push(repo.add_edge(spec, stamp)?);
    }
    for change in set.edges_of(ChangeKind::Remove) {
        // already gone when an endpoint was removed above
        if repo.contains_edge(&change.draft.id) {
            repo.delete_edge(&change.draft.id, stamp)?;
            changes.edges_removed.push(change.draft.id.clone());
        }
    }

    for id in retyped {
        repo.verify_incident_edges(id)?;
    }

    Ok(out)
}

fn touches_removed(removed: &HashSet<&NodeId>, from: &NodeId, to: &NodeId) -> bool {
    removed.contains(from) || removed.contains(to)
}
