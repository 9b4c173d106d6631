//! Closed node and edge kind enumerations

use crate::entity::Attributes;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Attribute carrying an element's lifecycle state
pub const LIFECYCLE_ATTRIBUTE: &str = "lifecycleState";

/// Kind of architecture element
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Top-level organisation
    Enterprise,
    /// Organisational unit
    Department,
    /// Business capability
    Capability,
    /// Business process
    BusinessProcess,
    /// Software application
    Application,
    /// Service exposed by an application
    ApplicationService,
    /// Logical data entity
    DataEntity,
    /// Technology component or platform
    Technology,
    /// Change initiative
    Project,
    /// Architecture principle
    Principle,
}

impl NodeKind {
    /// Every node kind, in declaration order
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Enterprise,
        NodeKind::Department,
        NodeKind::Capability,
        NodeKind::BusinessProcess,
        NodeKind::Application,
        NodeKind::ApplicationService,
        NodeKind::DataEntity,
        NodeKind::Technology,
        NodeKind::Project,
        NodeKind::Principle,
    ];

    /// Stable textual name (matches the serialized form)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Enterprise => "Enterprise",
            NodeKind::Department => "Department",
            NodeKind::Capability => "Capability",
            NodeKind::BusinessProcess => "BusinessProcess",
            NodeKind::Application => "Application",
            NodeKind::ApplicationService => "ApplicationService",
            NodeKind::DataEntity => "DataEntity",
            NodeKind::Technology => "Technology",
            NodeKind::Project => "Project",
            NodeKind::Principle => "Principle",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModelError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Kind of directed relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Ownership of an element by an organisation or application
    Owns,
    /// Application supports a capability or process
    Supports,
    /// Application realizes a service
    Realizes,
    /// Service serves a process or capability
    Serves,
    /// Runtime or build dependency
    DependsOn,
    /// Consumer uses a provider
    Uses,
    /// Application stores a data entity
    Stores,
    /// Parent/child decomposition
    Composes,
    /// Project impacts an element
    Impacts,
    /// Principle governs an element
    Governs,
}

impl EdgeKind {
    /// Every edge kind, in declaration order
    pub const ALL: [EdgeKind; 10] = [
        EdgeKind::Owns,
        EdgeKind::Supports,
        EdgeKind::Realizes,
        EdgeKind::Serves,
        EdgeKind::DependsOn,
        EdgeKind::Uses,
        EdgeKind::Stores,
        EdgeKind::Composes,
        EdgeKind::Impacts,
        EdgeKind::Governs,
    ];

    /// Stable textual name (matches the serialized form)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Owns => "OWNS",
            EdgeKind::Supports => "SUPPORTS",
            EdgeKind::Realizes => "REALIZES",
            EdgeKind::Serves => "SERVES",
            EdgeKind::DependsOn => "DEPENDS_ON",
            EdgeKind::Uses => "USES",
            EdgeKind::Stores => "STORES",
            EdgeKind::Composes => "COMPOSES",
            EdgeKind::Impacts => "IMPACTS",
            EdgeKind::Governs => "GOVERNS",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', ' '], "_");
        EdgeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| ModelError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Lifecycle of an architecture element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Being drafted
    Draft,
    /// Submitted for review
    Review,
    /// Approved for use
    Approved,
    /// No longer in use
    Retired,
}

impl LifecycleState {
    /// Read the lifecycle state from an attribute map
    ///
    /// Missing or unrecognised values read as `None`.
    #[must_use]
    pub fn from_attributes(attributes: &Attributes) -> Option<Self> {
        let raw = attributes.get(LIFECYCLE_ATTRIBUTE)?.as_str()?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "review" | "in-review" | "in_review" => Some(Self::Review),
            "approved" => Some(Self::Approved),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    /// Whether traceability checks apply to an element in this state
    #[inline]
    #[must_use]
    pub fn is_review_ready(self) -> bool {
        matches!(self, Self::Review | Self::Approved)
    }
}
