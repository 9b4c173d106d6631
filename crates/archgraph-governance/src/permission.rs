//! Ordered, short-circuiting authorization
//!
//! [`PermissionChain::enforce`] evaluates three stages in a fixed order and
//! stops at the first denial:
//!
//! 1. context lock: a locked (read-only) context refuses every role
//! 2. role permission: the role must grant the requested permission
//! 3. governance: resolves the validation mode for the allowed action
//!
//! The order matters. A locked historical view stays read-only even for an
//! [`Role::Owner`] under strict governance.

use crate::config::GovernanceMode;
use crate::validation::ValidationMode;
use archgraph_repository::ContextLock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action a caller wants to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read repository state
    Read,
    /// Stage changes and make direct edits
    Write,
    /// Merge a workspace into the repository
    Commit,
    /// Run batch imports
    Import,
    /// Change repository settings
    Administer,
}

impl Permission {
    /// Every permission
    pub const ALL: [Permission; 5] = [
        Permission::Read,
        Permission::Write,
        Permission::Commit,
        Permission::Import,
        Permission::Administer,
    ];

    /// Stable textual name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Commit => "commit",
            Self::Import => "import",
            Self::Administer => "administer",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read only
    Viewer,
    /// Read and write
    Contributor,
    /// Read, write, commit and import
    Architect,
    /// Everything
    Owner,
}

impl Role {
    /// Permissions granted to this role
    #[must_use]
    pub fn grants(self) -> &'static [Permission] {
        match self {
            Self::Viewer => &[Permission::Read],
            Self::Contributor => &[Permission::Read, Permission::Write],
            Self::Architect => &[
                Permission::Read,
                Permission::Write,
                Permission::Commit,
                Permission::Import,
            ],
            Self::Owner => &Permission::ALL,
        }
    }

    /// Whether this role grants `permission`
    #[inline]
    #[must_use]
    pub fn has(self, permission: Permission) -> bool {
        self.grants().contains(&permission)
    }

    /// Stable textual name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Contributor => "contributor",
            Self::Architect => "architect",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "contributor" => Ok(Self::Contributor),
            "architect" => Ok(Self::Architect),
            "owner" => Ok(Self::Owner),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A named user acting in a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User name, recorded in bookkeeping and audit events
    pub name: String,
    /// Role
    pub role: Role,
}

impl Actor {
    /// New actor
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

/// Chain stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainStage {
    /// Context lock check
    #[serde(rename = "context-lock")]
    ContextLock,
    /// Role grant check
    #[serde(rename = "role-permission")]
    RolePermission,
    /// Governance mode resolution
    #[serde(rename = "governance")]
    Governance,
}

impl ChainStage {
    /// Stable textual name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContextLock => "context-lock",
            Self::RolePermission => "role-permission",
            Self::Governance => "governance",
        }
    }
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// Validation strictness for the action
    pub mode: ValidationMode,
    /// Stages evaluated, in order
    pub evaluated: Vec<ChainStage>,
}

/// Refused request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{permission} denied for {role} at {failed_at}: {reason}")]
pub struct Denial {
    /// Stage that refused
    pub failed_at: ChainStage,
    /// Requesting role
    pub role: Role,
    /// Requested permission
    pub permission: Permission,
    /// Human-readable reason
    pub reason: String,
    /// Stages evaluated, in order
    pub evaluated: Vec<ChainStage>,
}

/// The authorization gate
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionChain;

impl PermissionChain {
    /// New chain
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the chain
    ///
    /// # Errors
    /// [`Denial`] naming the first stage that refused.
    pub fn enforce(
        &self,
        lock: &ContextLock,
        role: Role,
        permission: Permission,
        governance: GovernanceMode,
    ) -> Result<Authorization, Denial> {
        let mut evaluated = vec![ChainStage::ContextLock];
        if lock.is_locked() {
            return Err(deny(
                ChainStage::ContextLock,
                role,
                permission,
                lock.reason().unwrap_or("context is read-only"),
                evaluated,
            ));
        }

        evaluated.push(ChainStage::RolePermission);
        if !role.has(permission) {
            return Err(deny(
                ChainStage::RolePermission,
                role,
                permission,
                &format!("role {role} lacks {permission}"),
                evaluated,
            ));
        }

        evaluated.push(ChainStage::Governance);
        let mode = match governance {
            GovernanceMode::Strict => ValidationMode::Blocking,
            GovernanceMode::Advisory => ValidationMode::NonBlocking,
        };
        Ok(Authorization { mode, evaluated })
    }
}

fn deny(
    failed_at: ChainStage,
    role: Role,
    permission: Permission,
    reason: &str,
    evaluated: Vec<ChainStage>,
) -> Denial {
    tracing::warn!(%failed_at, %role, %permission, reason, "permission denied");
    Denial {
        failed_at,
        role,
        permission,
        reason: reason.to_string(),
        evaluated,
    }
}
