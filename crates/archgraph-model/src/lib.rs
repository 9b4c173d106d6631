//! archgraph Model
//!
//! Typed vocabulary shared by the repository and governance crates.
//!
//! # Core Concepts
//!
//! - [`NodeKind`] / [`EdgeKind`]: closed enumerations of element and relationship kinds
//! - [`Node`] / [`Edge`]: committed graph entities with JSON attributes
//! - [`SchemaRegistry`]: per-kind table of required attributes, endpoint rules and
//!   cardinality rules, resolved by lookup
//! - [`canonical`]: key-sorted canonical forms used for change detection
//! - [`ErrorCode`]: the error taxonomy every crate maps its failures onto
//!
//! # Example
//!
//! ```rust
//! use archgraph_model::{EdgeKind, NodeKind, SchemaRegistry};
//!
//! let schema = SchemaRegistry::standard();
//! assert!(schema.permits(EdgeKind::Owns, NodeKind::Enterprise, NodeKind::Capability));
//! assert!(!schema.permits(EdgeKind::Owns, NodeKind::Technology, NodeKind::Enterprise));
//! ```

#![warn(unreachable_pub)]

pub mod canonical;
mod entity;
mod error;
mod ids;
mod kind;
mod schema;

pub use entity::{
    apply_patch, strip_bookkeeping, Attributes, Edge, EdgeSpec, Node, NodeSpec, PatchMode, Stamp,
    BOOKKEEPING_KEYS, CREATED_AT, CREATED_BY, LAST_MODIFIED_AT, LAST_MODIFIED_BY,
};
pub use error::{ErrorCode, ModelError};
pub use ids::{EdgeId, NodeId};
pub use kind::{EdgeKind, LifecycleState, NodeKind, LIFECYCLE_ATTRIBUTE};
pub use schema::{
    CardinalityRule, Direction, EdgeSchema, NodeSchema, RuleActivation, SchemaRegistry,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
