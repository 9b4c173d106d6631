//! Repository error types

use archgraph_model::{EdgeKind, ErrorCode, ModelError, NodeId, NodeKind};
use std::fmt;

/// Which collection an id was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    /// Node collection
    Node,
    /// Edge collection
    Edge,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Node => f.write_str("node"),
            EntityType::Edge => f.write_str("edge"),
        }
    }
}

/// Typed failure of a repository mutation
///
/// A failing mutation leaves the repository it was applied to unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// Id already present
    #[error("duplicate {entity} id: {id}")]
    DuplicateId {
        /// Collection the id collided in
        entity: EntityType,
        /// Offending id
        id: String,
    },

    /// Kind outside the closed vocabulary
    #[error("unknown type: {kind}")]
    UnknownType {
        /// Rejected kind text
        kind: String,
    },

    /// Id not present
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Collection searched
        entity: EntityType,
        /// Missing id
        id: String,
    },

    /// Edge endpoint does not resolve
    #[error("edge {edge} references missing node {missing}")]
    DanglingEndpoint {
        /// Edge being written
        edge: String,
        /// Endpoint that does not exist
        missing: NodeId,
    },

    /// Endpoint kinds not permitted for the edge kind
    #[error("{kind} edge {edge} may not connect {from} -> {to}")]
    InvalidEndpointTypes {
        /// Edge being written
        edge: String,
        /// Edge kind
        kind: EdgeKind,
        /// Source node kind
        from: NodeKind,
        /// Target node kind
        to: NodeKind,
    },

    /// Handle was closed
    #[error("repository handle is closed")]
    HandleClosed,

    /// Handle is a read-only historical view
    #[error("repository context is locked: {reason}")]
    ContextLocked {
        /// Why the context is read-only
        reason: String,
    },

    /// Another writer holds the repository
    #[error("another commit is in progress")]
    CommitInProgress,

    /// Undo stack empty
    #[error("nothing to undo")]
    NothingToUndo,

    /// Redo stack empty
    #[error("nothing to redo")]
    NothingToRedo,
}

impl RepositoryError {
    /// Taxonomy code for this error
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::DuplicateId { .. } => Some(ErrorCode::DuplicateId),
            Self::UnknownType { .. } => Some(ErrorCode::UnknownType),
            Self::NotFound { .. } => Some(ErrorCode::NotFound),
            Self::DanglingEndpoint { .. } => Some(ErrorCode::DanglingEndpoint),
            Self::InvalidEndpointTypes { .. } => Some(ErrorCode::InvalidEndpointTypes),
            Self::ContextLocked { .. } => Some(ErrorCode::PermissionDenied),
            Self::HandleClosed
            | Self::CommitInProgress
            | Self::NothingToUndo
            | Self::NothingToRedo => None,
        }
    }

    /// Whether retrying with different input (or later) can succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::HandleClosed | Self::ContextLocked { .. })
    }

    pub(crate) fn node_not_found(id: &NodeId) -> Self {
        Self::NotFound {
            entity: EntityType::Node,
            id: id.to_string(),
        }
    }
}

impl From<ModelError> for RepositoryError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::UnknownKind { kind } => Self::UnknownType { kind },
        }
    }
}

/// Convenience alias
pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;
