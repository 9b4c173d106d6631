//! Live repository handle
//!
//! [`RepositoryHandle`] owns the published [`GraphRepository`] together with
//! its history, audit log and event bus. Readers take an `Arc` of the
//! current revision and never observe a partial update; writers go through
//! [`RepositoryHandle::begin_write`], which hands out the single-writer
//! [`WriteGuard`].

use crate::audit::{AuditAction, AuditLog, AuditRecord};
use crate::config::RepositoryConfig;
use crate::error::{RepositoryError, Result};
use crate::events::{ChangeCause, ChangeSummary, EventBus, RepositoryEvent, SubscriptionId};
use crate::graph::GraphRepository;
use crate::history::HistoryStack;
use crate::snapshot::{SnapshotDocument, SnapshotError};
use archgraph_model::{
    Attributes, Edge, EdgeId, EdgeSpec, NodeId, NodeSpec, PatchMode, SchemaRegistry, Stamp,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only marker for a repository context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextLock {
    locked: bool,
    reason: Option<String>,
}

impl ContextLock {
    /// Writable context
    #[must_use]
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// Read-only context
    #[must_use]
    pub fn locked(reason: impl Into<String>) -> Self {
        Self {
            locked: true,
            reason: Some(reason.into()),
        }
    }

    /// Whether writes are refused
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Shared handle to one open repository
#[derive(Debug)]
pub struct RepositoryHandle {
    config: RepositoryConfig,
    live: RwLock<Arc<GraphRepository>>,
    history: Mutex<HistoryStack>,
    audit: AuditLog,
    events: EventBus,
    writer: Mutex<()>,
    context: RwLock<ContextLock>,
    closed: AtomicBool,
}

impl RepositoryHandle {
    /// Open an empty repository
    #[must_use]
    pub fn open(config: RepositoryConfig, schema: Arc<SchemaRegistry>) -> Self {
        let mut repo = GraphRepository::new(config.name.clone(), schema);
        repo.set_description(config.description.clone());
        Self::from_repository(repo, config)
    }

    /// Open a repository from a snapshot document
    ///
    /// The document's name wins over the configured one.
    ///
    /// # Errors
    /// Any [`SnapshotError`] raised while loading.
    pub fn load(
        doc: &SnapshotDocument,
        schema: Arc<SchemaRegistry>,
        config: RepositoryConfig,
    ) -> std::result::Result<Self, SnapshotError> {
        let repo = GraphRepository::from_document(doc, schema)?;
        let config = config.with_name(repo.name());
        Ok(Self::from_repository(repo, config))
    }

    /// Open a read-only view of a historical snapshot
    ///
    /// # Errors
    /// Any [`SnapshotError`] raised while loading.
    pub fn open_historical(
        doc: &SnapshotDocument,
        schema: Arc<SchemaRegistry>,
        reason: impl Into<String>,
    ) -> std::result::Result<Self, SnapshotError> {
        let handle = Self::load(doc, schema, RepositoryConfig::default())?;
        handle.set_context_lock(ContextLock::locked(reason));
        Ok(handle)
    }

    /// Wrap an existing repository
    #[must_use]
    pub fn from_repository(repo: GraphRepository, config: RepositoryConfig) -> Self {
        tracing::info!(
            repository = repo.name(),
            revision = repo.revision(),
            nodes = repo.node_count(),
            edges = repo.edge_count(),
            "repository opened"
        );
        Self {
            history: Mutex::new(HistoryStack::new(config.history_depth)),
            audit: AuditLog::new(repo.name()),
            live: RwLock::new(Arc::new(repo)),
            events: EventBus::new(),
            writer: Mutex::new(()),
            context: RwLock::new(ContextLock::unlocked()),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Close the handle and return the final state
    ///
    /// Later reads and writes fail with `HandleClosed`.
    ///
    /// # Errors
    /// `HandleClosed` if already closed, `CommitInProgress` while a writer
    /// holds the repository.
    pub fn close(&self) -> Result<SnapshotDocument> {
        let _writer = self.writer.try_lock().ok_or(RepositoryError::CommitInProgress)?;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(RepositoryError::HandleClosed);
        }
        let repo = self.live.read().clone();
        self.history.lock().clear();
        tracing::info!(
            repository = repo.name(),
            revision = repo.revision(),
            "repository closed"
        );
        self.events.publish(&RepositoryEvent::Closed {
            name: repo.name().to_string(),
        });
        Ok(repo.to_document())
    }

    /// Whether [`close`](Self::close) has run
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The published revision
    ///
    /// # Errors
    /// `HandleClosed` after close.
    pub fn current(&self) -> Result<Arc<GraphRepository>> {
        self.ensure_open()?;
        Ok(self.live.read().clone())
    }

    /// Current state as a snapshot document
    ///
    /// # Errors
    pub fn snapshot_document(&self) -> Result<SnapshotDocument> {
        Ok(self.current()?.to_document())
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.live.read().revision()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a change listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RepositoryEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    #[must_use]
    pub fn context_lock(&self) -> ContextLock {
        self.context.read().clone()
    }

    /// Replace the context lock
    pub fn set_context_lock(&self, lock: ContextLock) {
        tracing::debug!(
            repository = self.name(),
            locked = lock.is_locked(),
            "context lock changed"
        );
        *self.context.write() = lock;
    }

    /// Acquire the single-writer guard
    ///
    /// Never blocks: a second concurrent writer gets `CommitInProgress`.
    ///
    /// # Errors
    /// `HandleClosed`, `ContextLocked` or `CommitInProgress`.
    pub fn begin_write(&self) -> Result<WriteGuard<'_>> {
        self.ensure_open()?;
        self.ensure_writable()?;
        let guard = self.writer.try_lock().ok_or_else(|| {
            tracing::warn!(repository = self.name(), "write refused, writer busy");
            RepositoryError::CommitInProgress
        })?;
        let base = self.live.read().clone();
        Ok(WriteGuard {
            handle: self,
            _guard: guard,
            base,
        })
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }

    /// Restore the state preceding the last published change
    ///
    /// # Errors
    /// `NothingToUndo`, or any [`begin_write`](Self::begin_write) failure.
    pub fn undo(&self, actor: &str) -> Result<u64> {
        self.step(actor, ChangeCause::Undo)
    }

    /// Re-apply the last undone change
    ///
    /// # Errors
    /// `NothingToRedo`, or any [`begin_write`](Self::begin_write) failure.
    pub fn redo(&self, actor: &str) -> Result<u64> {
        self.step(actor, ChangeCause::Redo)
    }

    fn step(&self, actor: &str, cause: ChangeCause) -> Result<u64> {
        let guard = self.begin_write()?;
        let current = guard.base.snapshot();
        let target = {
            let mut history = self.history.lock();
            match cause {
                ChangeCause::Undo => history.undo(current).ok_or(RepositoryError::NothingToUndo)?,
                _ => history.redo(current).ok_or(RepositoryError::NothingToRedo)?,
            }
        };
        let restored_from = target.revision();
        let mut next = (*guard.base).clone();
        next.restore(&target);

        let action = if cause == ChangeCause::Undo {
            AuditAction::Undo
        } else {
            AuditAction::Redo
        };
        let stamp = Stamp::now(actor);
        let record = AuditRecord::new(actor, action, self.name())
            .with_detail(format!("restored state of revision {restored_from}"));
        let revision = guard.install(next, &stamp, cause, ChangeSummary::default(), vec![record]);
        tracing::info!(
            repository = self.name(),
            revision,
            restored_from,
            action = action.as_str(),
            "history step applied"
        );
        Ok(revision)
    }

    /// Add a node as a single-step edit
    ///
    /// # Errors
    /// Any [`GraphRepository::add_node`] error or write refusal.
    pub fn add_node(&self, spec: NodeSpec, actor: &str) -> Result<NodeId> {
        self.edit(actor, |repo, stamp| {
            let id = repo.add_node(spec, stamp)?;
            let changes = ChangeSummary {
                nodes_added: vec![id.clone()],
                ..ChangeSummary::default()
            };
            Ok((id, changes))
        })
    }

    /// Add an edge as a single-step edit
    ///
    /// # Errors
    /// Any [`GraphRepository::add_edge`] error or write refusal.
    pub fn add_edge(&self, spec: EdgeSpec, actor: &str) -> Result<EdgeId> {
        self.edit(actor, |repo, stamp| {
            let id = repo.add_edge(spec, stamp)?;
            let changes = ChangeSummary {
                edges_added: vec![id.clone()],
                ..ChangeSummary::default()
            };
            Ok((id, changes))
        })
    }

    /// Patch node attributes as a single-step edit
    ///
    /// # Errors
    /// `NotFound` or write refusal.
    pub fn update_node_attributes(
        &self,
        id: &NodeId,
        patch: &Attributes,
        mode: PatchMode,
        actor: &str,
    ) -> Result<()> {
        self.edit(actor, |repo, stamp| {
            repo.update_node_attributes(id, patch, mode, stamp)?;
            let changes = ChangeSummary {
                nodes_modified: vec![id.clone()],
                ..ChangeSummary::default()
            };
            Ok(((), changes))
        })
    }

    /// Patch edge attributes as a single-step edit
    ///
    /// # Errors
    /// `NotFound` or write refusal.
    pub fn update_edge_attributes(
        &self,
        id: &EdgeId,
        patch: &Attributes,
        mode: PatchMode,
        actor: &str,
    ) -> Result<()> {
        self.edit(actor, |repo, stamp| {
            repo.update_edge_attributes(id, patch, mode, stamp)?;
            let changes = ChangeSummary {
                edges_modified: vec![id.clone()],
                ..ChangeSummary::default()
            };
            Ok(((), changes))
        })
    }

    /// Delete a node and its incident edges as a single-step edit
    ///
    /// # Errors
    /// `NotFound` or write refusal.
    pub fn delete_node(&self, id: &NodeId, actor: &str) -> Result<Vec<Edge>> {
        self.edit(actor, |repo, stamp| {
            let cascaded = repo.delete_node(id, stamp)?;
            let changes = ChangeSummary {
                nodes_removed: vec![id.clone()],
                edges_removed: cascaded.iter().map(|edge| edge.id.clone()).collect(),
                ..ChangeSummary::default()
            };
            Ok((cascaded, changes))
        })
    }

    /// Delete an edge as a single-step edit
    ///
    /// # Errors
    /// `NotFound` or write refusal.
    pub fn delete_edge(&self, id: &EdgeId, actor: &str) -> Result<Edge> {
        self.edit(actor, |repo, stamp| {
            let edge = repo.delete_edge(id, stamp)?;
            let changes = ChangeSummary {
                edges_removed: vec![id.clone()],
                ..ChangeSummary::default()
            };
            Ok((edge, changes))
        })
    }

    fn edit<T>(
        &self,
        actor: &str,
        apply: impl FnOnce(&mut GraphRepository, &Stamp) -> Result<(T, ChangeSummary)>,
    ) -> Result<T> {
        let guard = self.begin_write()?;
        let stamp = Stamp::now(actor);
        let mut next = (*guard.base).clone();
        let (value, changes) = apply(&mut next, &stamp)?;
        let records = AuditRecord::for_changes(actor, &changes);
        guard.publish(next, &stamp, ChangeCause::DirectEdit, changes, records);
        Ok(value)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RepositoryError::HandleClosed);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        let lock = self.context.read();
        if lock.is_locked() {
            let reason = lock.reason().unwrap_or("read-only").to_string();
            tracing::warn!(repository = self.name(), %reason, "write refused, context locked");
            return Err(RepositoryError::ContextLocked { reason });
        }
        Ok(())
    }
}

/// Exclusive right to publish the next revision
///
/// Dropping the guard without publishing leaves the repository unchanged.
#[derive(Debug)]
pub struct WriteGuard<'a> {
    handle: &'a RepositoryHandle,
    _guard: MutexGuard<'a, ()>,
    base: Arc<GraphRepository>,
}

impl WriteGuard<'_> {
    #[must_use]
    pub fn base(&self) -> &Arc<GraphRepository> {
        &self.base
    }

    /// Publish `next` as the new live revision
    ///
    /// Records the base for undo, swaps the live reference, appends
    /// `records` to the audit log and notifies subscribers. Returns the
    /// new revision number.
    pub fn publish(
        self,
        next: GraphRepository,
        stamp: &Stamp,
        cause: ChangeCause,
        changes: ChangeSummary,
        records: Vec<AuditRecord>,
    ) -> u64 {
        self.handle.history.lock().record(self.base.snapshot());
        self.install(next, stamp, cause, changes, records)
    }

    fn install(
        self,
        mut next: GraphRepository,
        stamp: &Stamp,
        cause: ChangeCause,
        changes: ChangeSummary,
        records: Vec<AuditRecord>,
    ) -> u64 {
        let handle = self.handle;
        let revision = next.advance_revision();
        *handle.live.write() = Arc::new(next);
        handle.audit.append_all(records, stamp.at);
        tracing::debug!(
            repository = handle.name(),
            revision,
            cause = %cause,
            changes = %changes,
            "revision published"
        );
        drop(self);
        handle.events.publish(&RepositoryEvent::Mutated {
            revision,
            actor: stamp.actor.clone(),
            cause,
            changes,
        });
        revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archgraph_model::{EdgeKind, NodeKind};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn named(name: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), json!(name));
        attrs
    }

    fn handle() -> RepositoryHandle {
        RepositoryHandle::open(
            RepositoryConfig::default().with_name("Acme"),
            Arc::new(SchemaRegistry::standard()),
        )
    }

    #[test]
    fn direct_edits_publish_revisions() {
        let handle = handle();
        let ent = handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, named("Acme")).with_id("ent"), "alice")
            .unwrap();
        let cap = handle
            .add_node(NodeSpec::new(NodeKind::Capability, named("Pay")).with_id("cap"), "alice")
            .unwrap();
        handle
            .add_edge(EdgeSpec::new(EdgeKind::Owns, ent, cap), "alice")
            .unwrap();

        assert_eq!(handle.revision(), 3);
        assert_eq!(handle.current().unwrap().edge_count(), 1);
        assert_eq!(handle.audit().len(), 3);
        assert!(handle.audit().verify_integrity().is_ok());
    }

    #[test]
    fn failed_edit_changes_nothing() {
        let handle = handle();
        let err = handle
            .add_edge(EdgeSpec::new(EdgeKind::Owns, "a", "b"), "alice")
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DanglingEndpoint { .. }));
        assert_eq!(handle.revision(), 0);
        assert!(handle.audit().is_empty());
        assert!(!handle.can_undo());
    }

    #[test]
    fn readers_keep_their_revision() {
        let handle = handle();
        let before = handle.current().unwrap();
        handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, named("Acme")), "alice")
            .unwrap();
        assert_eq!(before.node_count(), 0);
        assert_eq!(handle.current().unwrap().node_count(), 1);
    }

    #[test]
    fn undo_and_redo_restore_states() {
        let handle = handle();
        let id = handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, named("Acme")), "alice")
            .unwrap();

        handle.undo("alice").unwrap();
        assert!(!handle.current().unwrap().contains_node(&id));
        assert!(matches!(handle.undo("alice"), Err(RepositoryError::NothingToUndo)));

        handle.redo("alice").unwrap();
        assert!(handle.current().unwrap().contains_node(&id));
        assert!(matches!(handle.redo("alice"), Err(RepositoryError::NothingToRedo)));
        assert_eq!(handle.revision(), 3);
    }

    #[test]
    fn second_writer_is_refused() {
        let handle = handle();
        let _guard = handle.begin_write().unwrap();
        assert!(matches!(
            handle.begin_write(),
            Err(RepositoryError::CommitInProgress)
        ));
    }

    #[test]
    fn locked_context_refuses_writes() {
        let handle = handle();
        handle.set_context_lock(ContextLock::locked("historical view"));
        let err = handle
            .add_node(NodeSpec::new(NodeKind::Enterprise, named("Acme")), "alice")
            .unwrap_err();
        assert_eq!(
            err,
            RepositoryError::ContextLocked {
                reason: "historical view".into()
            }
        );
    }

    #[test]
    fn close_ends_the_lifecycle() {
        let handle = handle();
        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        handle.subscribe(move |event| {
            if matches!(event, RepositoryEvent::Closed { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let doc = handle.close().unwrap();
        assert_eq!(doc.metadata.name, "Acme");
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(matches!(handle.current(), Err(RepositoryError::HandleClosed)));
        assert!(matches!(handle.close(), Err(RepositoryError::HandleClosed)));
    }
}
