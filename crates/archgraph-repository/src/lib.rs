//! archgraph Repository
//!
//! The authoritative, versioned architecture graph.
//!
//! # Core Concepts
//!
//! - [`GraphRepository`]: committed nodes and edges in persistent maps;
//!   cloning is O(1) and clones never share mutations
//! - [`RepositoryHandle`]: an open repository with explicit open/close
//!   lifecycle, a live `Arc` readers can hold, and a single-writer guard
//! - [`HistoryStack`]: bounded undo/redo of published snapshots
//! - [`AuditLog`]: append-only, SHA-256 hash-chained record of every change
//! - [`EventBus`]: change notification after each published revision
//! - [`BatchImport`]: atomic import reporting every failing row
//! - [`AutosaveTask`]: host-ticked snapshot persistence
//!
//! # Example
//!
//! ```rust
//! use archgraph_model::{EdgeKind, EdgeSpec, NodeKind, NodeSpec, SchemaRegistry};
//! use archgraph_repository::{RepositoryConfig, RepositoryHandle};
//! use std::sync::Arc;
//!
//! let handle = RepositoryHandle::open(
//!     RepositoryConfig::default().with_name("Acme"),
//!     Arc::new(SchemaRegistry::standard()),
//! );
//! let ent = handle.add_node(NodeSpec::new(NodeKind::Enterprise, Default::default()), "alice")?;
//! let cap = handle.add_node(NodeSpec::new(NodeKind::Capability, Default::default()), "alice")?;
//! handle.add_edge(EdgeSpec::new(EdgeKind::Owns, ent, cap), "alice")?;
//!
//! assert_eq!(handle.current()?.edge_count(), 1);
//! handle.undo("alice")?;
//! assert_eq!(handle.current()?.edge_count(), 0);
//! # Ok::<(), archgraph_repository::RepositoryError>(())
//! ```

#![warn(unreachable_pub)]

pub mod audit;
pub mod autosave;
pub mod batch;
mod config;
mod error;
pub mod events;
mod graph;
mod handle;
mod history;
pub mod snapshot;

pub use audit::{AuditAction, AuditError, AuditEvent, AuditLog, AuditRecord};
pub use autosave::{AutosaveTask, FileSnapshotSink, ScheduledTask, SnapshotSink};
pub use batch::{BatchError, BatchImport, BatchReport, ImportMode, RowError};
pub use config::{AutosaveConfig, RepositoryConfig};
pub use error::{EntityType, RepositoryError, Result};
pub use events::{ChangeCause, ChangeSummary, EventBus, RepositoryEvent, SubscriptionId};
pub use graph::GraphRepository;
pub use handle::{ContextLock, RepositoryHandle, WriteGuard};
pub use history::{HistoryStack, DEFAULT_HISTORY_DEPTH};
pub use snapshot::{Snapshot, SnapshotDocument, SnapshotError, SNAPSHOT_VERSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
