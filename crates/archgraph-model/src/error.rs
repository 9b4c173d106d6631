//! Error taxonomy shared across archgraph crates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error code for every failure the engine can report
///
/// Crate-specific error enums map onto these codes so that callers can
/// branch on a single vocabulary regardless of which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// An entity with the same id already exists
    DuplicateId,
    /// A node or edge kind is not part of the closed vocabulary
    UnknownType,
    /// Referenced entity does not exist
    NotFound,
    /// An edge endpoint does not resolve to a node
    DanglingEndpoint,
    /// The endpoint kinds are not permitted for the edge kind
    InvalidEndpointTypes,
    /// A required attribute is absent or blank
    MissingRequiredAttribute,
    /// A structural edge-count rule is violated
    CardinalityViolation,
    /// The caller may not perform the operation
    PermissionDenied,
    /// Validation findings block the operation under the active governance mode
    GovernanceBlocked,
}

impl ErrorCode {
    /// Snake-case code string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::DuplicateId => "duplicate_id",
            ErrorCode::UnknownType => "unknown_type",
            ErrorCode::NotFound => "not_found",
            ErrorCode::DanglingEndpoint => "dangling_endpoint",
            ErrorCode::InvalidEndpointTypes => "invalid_endpoint_types",
            ErrorCode::MissingRequiredAttribute => "missing_required_attribute",
            ErrorCode::CardinalityViolation => "cardinality_violation",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::GovernanceBlocked => "governance_blocked",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while interpreting model vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Text did not name a known node or edge kind
    #[error("unknown kind: {kind}")]
    UnknownKind {
        /// The rejected input
        kind: String,
    },
}

impl ModelError {
    /// Taxonomy code for this error
    #[inline]
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ModelError::UnknownKind { .. } => ErrorCode::UnknownType,
        }
    }
}
