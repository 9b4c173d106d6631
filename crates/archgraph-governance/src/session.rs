//! Permission-gated editing session
//!
//! A [`Session`] binds an [`Actor`] to an open [`RepositoryHandle`] and
//! routes every entry point through the [`PermissionChain`] before
//! touching the repository: single-step edits, batch imports, undo/redo
//! and workspace commits.

use crate::commit::{CommitCoordinator, CommitReceipt};
use crate::config::GovernanceConfig;
use crate::error::SessionError;
use crate::permission::{Actor, Authorization, Permission, PermissionChain};
use crate::validation::{ValidationMode, ValidationReport};
use crate::workspace::Workspace;
use archgraph_model::{Attributes, Edge, EdgeId, EdgeSpec, NodeId, NodeSpec, PatchMode};
use archgraph_repository::{
    BatchImport, BatchReport, ContextLock, GraphRepository, ImportMode, RepositoryHandle,
};
use std::sync::Arc;

type Result<T> = std::result::Result<T, SessionError>;

/// One actor's view of an open repository
#[derive(Debug, Clone)]
pub struct Session {
    handle: Arc<RepositoryHandle>,
    actor: Actor,
    chain: PermissionChain,
    coordinator: CommitCoordinator,
}

impl Session {
    /// Start a session
    ///
    /// # Errors
    /// `HandleClosed` after close.
    pub fn new(
        handle: Arc<RepositoryHandle>,
        actor: Actor,
        governance: GovernanceConfig,
    ) -> Result<Self> {
        let coordinator = CommitCoordinator::for_handle(&handle, governance)?;
        Ok(Self {
            handle,
            actor,
            chain: PermissionChain::new(),
            coordinator,
        })
    }

    #[must_use]
    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<RepositoryHandle> {
        &self.handle
    }

    /// Check `permission` without acting
    ///
    /// # Errors
    /// `PermissionDenied` naming the refusing stage.
    pub fn authorize(&self, permission: Permission) -> Result<Authorization> {
        Ok(self.chain.enforce(
            &self.handle.context_lock(),
            self.actor.role,
            permission,
            self.coordinator.governance().mode,
        )?)
    }

    /// Current revision
    ///
    /// # Errors
    /// `PermissionDenied` or `HandleClosed`.
    pub fn read(&self) -> Result<Arc<GraphRepository>> {
        self.read_permitted()?;
        Ok(self.handle.current()?)
    }

    #[must_use]
    pub fn new_workspace(&self) -> Workspace {
        Workspace::new()
    }

    /// Add a node directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn add_node(&self, spec: NodeSpec) -> Result<NodeId> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.add_node(spec, &self.actor.name)?)
    }

    /// Add an edge directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn add_edge(&self, spec: EdgeSpec) -> Result<EdgeId> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.add_edge(spec, &self.actor.name)?)
    }

    /// Patch node attributes directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn update_node_attributes(
        &self,
        id: &NodeId,
        patch: &Attributes,
        mode: PatchMode,
    ) -> Result<()> {
        self.authorize(Permission::Write)?;
        Ok(self
            .handle
            .update_node_attributes(id, patch, mode, &self.actor.name)?)
    }

    /// Patch edge attributes directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn update_edge_attributes(
        &self,
        id: &EdgeId,
        patch: &Attributes,
        mode: PatchMode,
    ) -> Result<()> {
        self.authorize(Permission::Write)?;
        Ok(self
            .handle
            .update_edge_attributes(id, patch, mode, &self.actor.name)?)
    }

    /// Delete a node and its incident edges directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn delete_node(&self, id: &NodeId) -> Result<Vec<Edge>> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.delete_node(id, &self.actor.name)?)
    }

    /// Delete an edge directly
    ///
    /// # Errors
    /// `PermissionDenied` or any repository failure.
    pub fn delete_edge(&self, id: &EdgeId) -> Result<Edge> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.delete_edge(id, &self.actor.name)?)
    }

    /// Import a batch atomically
    ///
    /// # Errors
    /// `PermissionDenied` or the batch failure with every row error.
    pub fn import(&self, batch: &BatchImport, mode: ImportMode) -> Result<BatchReport> {
        self.authorize(Permission::Import)?;
        Ok(self.handle.import(batch, mode, &self.actor.name)?)
    }

    /// Step back one published change
    ///
    /// # Errors
    /// `PermissionDenied`, `NothingToUndo` or write refusal.
    pub fn undo(&self) -> Result<u64> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.undo(&self.actor.name)?)
    }

    /// Step forward one undone change
    ///
    /// # Errors
    /// `PermissionDenied`, `NothingToRedo` or write refusal.
    pub fn redo(&self) -> Result<u64> {
        self.authorize(Permission::Write)?;
        Ok(self.handle.redo(&self.actor.name)?)
    }

    /// Validate without committing, under the session's governance mode
    ///
    /// # Errors
    /// `PermissionDenied` or `HandleClosed`.
    pub fn validate(&self, workspace: &Workspace) -> Result<ValidationReport> {
        let mode = self.read_permitted()?;
        let repo = self.handle.current()?;
        Ok(self.coordinator.pipeline().validate(workspace, &repo, mode))
    }

    /// Commit a workspace
    ///
    /// # Errors
    /// Any [`CommitError`](crate::CommitError).
    pub fn commit(&self, workspace: &mut Workspace) -> Result<CommitReceipt> {
        Ok(self.coordinator.commit(workspace, &self.handle, &self.actor)?)
    }

    fn read_permitted(&self) -> Result<ValidationMode> {
        // locked historical views stay readable
        let authorization = self.chain.enforce(
            &ContextLock::unlocked(),
            self.actor.role,
            Permission::Read,
            self.coordinator.governance().mode,
        )?;
        Ok(authorization.mode)
    }
}
