//! Governance error types

use crate::permission::Denial;
use crate::validation::Finding;
use crate::workspace::WorkspaceStatus;
use archgraph_model::ErrorCode;
use archgraph_repository::{BatchError, EntityType, RepositoryError};

/// Workspace staging failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    /// Workspace already committed or discarded
    #[error("workspace {id} is {status}")]
    WorkspaceClosed {
        /// Workspace id
        id: String,
        /// Terminal status
        status: WorkspaceStatus,
    },

    /// No draft with this id
    #[error("{entity} {id} is not drafted in this workspace")]
    NotDrafted {
        /// Collection searched
        entity: EntityType,
        /// Missing id
        id: String,
    },

    /// Committed entity lookup failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkspaceError {
    /// Taxonomy code, when one applies
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::WorkspaceClosed { .. } => None,
            Self::NotDrafted { .. } => Some(ErrorCode::NotFound),
            Self::Repository(err) => err.code(),
        }
    }

    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::WorkspaceClosed { .. })
    }
}

/// Commit failure
///
/// Every variant leaves the repository and the workspace untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// Workspace already committed or discarded
    #[error("workspace {id} is {status}")]
    WorkspaceClosed {
        /// Workspace id
        id: String,
        /// Terminal status
        status: WorkspaceStatus,
    },

    /// Authorization refused
    #[error(transparent)]
    PermissionDenied(#[from] Denial),

    /// Validation produced blocking findings
    #[error("commit blocked by {} finding(s)", findings.iter().filter(|f| f.is_blocking()).count())]
    GovernanceBlocked {
        /// Complete ordered finding list
        findings: Vec<Finding>,
    },

    /// The handle refused the write
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A change failed while applying to the clone
    #[error("commit aborted while applying changes: {source}")]
    Apply {
        /// Failing mutation
        source: RepositoryError,
    },
}

impl CommitError {
    /// Taxonomy code, when one applies
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::WorkspaceClosed { .. } => None,
            Self::PermissionDenied(_) => Some(ErrorCode::PermissionDenied),
            Self::GovernanceBlocked { .. } => Some(ErrorCode::GovernanceBlocked),
            Self::Repository(err) | Self::Apply { source: err } => err.code(),
        }
    }

    /// Whether fixing the workspace (or waiting) can make a retry succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::WorkspaceClosed { .. } | Self::PermissionDenied(_) => false,
            Self::GovernanceBlocked { .. } | Self::Apply { .. } => true,
            Self::Repository(err) => err.is_recoverable(),
        }
    }

    /// Findings carried by a governance refusal
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        match self {
            Self::GovernanceBlocked { findings } => findings,
            _ => &[],
        }
    }
}

/// Session operation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Authorization refused
    #[error(transparent)]
    PermissionDenied(#[from] Denial),

    /// Repository mutation failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Batch import failed
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Workspace commit failed
    #[error(transparent)]
    Commit(#[from] CommitError),
}

impl SessionError {
    /// Taxonomy code, when one applies
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::PermissionDenied(_) => Some(ErrorCode::PermissionDenied),
            Self::Repository(err) => err.code(),
            Self::Batch(err) => err.code(),
            Self::Commit(err) => err.code(),
        }
    }

    /// Whether a retry with different input can succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::PermissionDenied(_) => false,
            Self::Repository(err) => err.is_recoverable(),
            Self::Batch(err) => err.is_recoverable(),
            Self::Commit(err) => err.is_recoverable(),
        }
    }
}
