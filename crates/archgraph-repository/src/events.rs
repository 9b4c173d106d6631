//! Repository change events and the publish/subscribe bus
//!
//! The [`EventBus`] belongs to the [`RepositoryHandle`](crate::RepositoryHandle)
//! and fires after a new revision has been swapped in, so subscribers
//! always observe the published state.

use archgraph_model::{EdgeId, NodeId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What produced a new revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCause {
    /// Single-step edit through the handle or a session
    DirectEdit,
    /// Workspace commit
    Commit {
        /// Committed workspace id
        workspace: String,
    },
    /// Batch import
    BatchImport,
    /// History step back
    Undo,
    /// History step forward
    Redo,
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectEdit => f.write_str("direct-edit"),
            Self::Commit { workspace } => write!(f, "commit:{workspace}"),
            Self::BatchImport => f.write_str("batch-import"),
            Self::Undo => f.write_str("undo"),
            Self::Redo => f.write_str("redo"),
        }
    }
}

/// Ids touched by one revision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    /// Nodes created
    pub nodes_added: Vec<NodeId>,
    /// Nodes changed in place
    pub nodes_modified: Vec<NodeId>,
    /// Nodes deleted
    pub nodes_removed: Vec<NodeId>,
    /// Edges created
    pub edges_added: Vec<EdgeId>,
    /// Edges changed in place
    pub edges_modified: Vec<EdgeId>,
    /// Edges deleted, cascades included
    pub edges_removed: Vec<EdgeId>,
}

impl ChangeSummary {
    /// Total number of touched entities
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes_added.len()
            + self.nodes_modified.len()
            + self.nodes_removed.len()
            + self.edges_added.len()
            + self.edges_modified.len()
            + self.edges_removed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes +{} ~{} -{}, edges +{} ~{} -{}",
            self.nodes_added.len(),
            self.nodes_modified.len(),
            self.nodes_removed.len(),
            self.edges_added.len(),
            self.edges_modified.len(),
            self.edges_removed.len(),
        )
    }
}

/// Event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryEvent {
    /// A new revision was published
    Mutated {
        /// Revision now live
        revision: u64,
        /// Acting user
        actor: String,
        /// What produced it
        cause: ChangeCause,
        /// Touched ids
        changes: ChangeSummary,
    },
    /// The handle was closed
    Closed {
        /// Repository name
        name: String,
    },
}

/// Opaque subscription token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&RepositoryEvent) + Send + Sync>;

/// Synchronous publish/subscribe bus
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusState>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.lock().listeners.len())
            .finish()
    }
}

impl EventBus {
    /// Empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RepositoryEvent) + Send + Sync + 'static,
    {
        let mut state = self.inner.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(sub, _)| *sub != id);
        state.listeners.len() != before
    }

    /// Deliver `event` to every listener in subscription order
    ///
    /// Listeners run outside the bus lock and may subscribe or unsubscribe.
    pub fn publish(&self, event: &RepositoryEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mutated(revision: u64) -> RepositoryEvent {
        RepositoryEvent::Mutated {
            revision,
            actor: "alice".into(),
            cause: ChangeCause::DirectEdit,
            changes: ChangeSummary::default(),
        }
    }

    #[test]
    fn publish_reaches_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&mutated(1));
        bus.publish(&mutated(2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&mutated(1));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn summary_display() {
        let summary = ChangeSummary {
            nodes_added: vec![NodeId::new("a")],
            edges_removed: vec![EdgeId::new("e1"), EdgeId::new("e2")],
            ..ChangeSummary::default()
        };
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.to_string(), "nodes +1 ~0 -0, edges +0 ~0 -2");
    }
}
