//! archgraph Governance
//!
//! Staged changes and the rules they must pass before reaching the
//! repository.
//!
//! # Core Concepts
//!
//! - [`Workspace`]: isolated, ordered draft nodes and edges with tombstones
//! - [`DiffEngine`]: classifies drafts as add, modify, remove or no-op
//! - [`ValidationPipeline`]: mandatory-field and cardinality checks over the
//!   [`ProposedGraph`], reported as severity-tagged [`Finding`]s
//! - [`PermissionChain`]: context lock → role permission → governance mode
//! - [`CommitCoordinator`]: validate, diff, clone, apply, swap, audit
//! - [`Session`]: an actor's permission-gated entry point to all of the above
//!
//! # Example
//!
//! ```rust
//! use archgraph_governance::{Actor, GovernanceConfig, Role, Session};
//! use archgraph_model::{Attributes, EdgeKind, EdgeSpec, NodeKind, NodeSpec, SchemaRegistry};
//! use archgraph_repository::{RepositoryConfig, RepositoryHandle};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let handle = Arc::new(RepositoryHandle::open(
//!     RepositoryConfig::default(),
//!     Arc::new(SchemaRegistry::standard()),
//! ));
//! let session = Session::new(
//!     Arc::clone(&handle),
//!     Actor::new("alice", Role::Architect),
//!     GovernanceConfig::strict(),
//! )?;
//!
//! let mut name = Attributes::new();
//! name.insert("name".into(), json!("Acme"));
//! let ent = session.add_node(NodeSpec::new(NodeKind::Enterprise, name.clone()))?;
//!
//! let mut ws = session.new_workspace();
//! name.insert("name".into(), json!("Payments"));
//! let cap = ws.stage_node(NodeSpec::new(NodeKind::Capability, name)).unwrap();
//! ws.stage_edge(EdgeSpec::new(EdgeKind::Owns, ent, cap)).unwrap();
//!
//! let receipt = session.commit(&mut ws)?;
//! assert_eq!(receipt.changes.len(), 2);
//! # Ok::<(), archgraph_governance::SessionError>(())
//! ```

#![warn(unreachable_pub)]

pub mod commit;
mod config;
pub mod diff;
mod error;
pub mod permission;
mod proposed;
mod session;
pub mod validation;
mod workspace;

pub use commit::{apply_changes, AppliedChanges, CommitCoordinator, CommitReceipt};
pub use config::{GovernanceConfig, GovernanceMode};
pub use diff::{ChangeKind, ChangeSet, DiffEngine, EdgeChange, NodeChange};
pub use error::{CommitError, SessionError, WorkspaceError};
pub use permission::{
    Actor, Authorization, ChainStage, Denial, Permission, PermissionChain, Role,
};
pub use proposed::ProposedGraph;
pub use session::Session;
pub use validation::{
    Finding, FindingCategory, Severity, ValidationMode, ValidationPipeline, ValidationReport,
};
pub use workspace::{DraftStatus, EdgeDraft, NodeDraft, Workspace, WorkspaceStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
