//! Governance configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly validation findings gate commits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceMode {
    /// Blocker and Error findings refuse the commit
    Strict,
    /// Findings are guidance only
    #[default]
    Advisory,
}

impl GovernanceMode {
    /// Stable textual name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Advisory => "advisory",
        }
    }
}

impl fmt::Display for GovernanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GovernanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "advisory" => Ok(Self::Advisory),
            other => Err(format!("unknown governance mode: {other}")),
        }
    }
}

/// `[governance]` settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Active mode
    pub mode: GovernanceMode,
}

impl GovernanceConfig {
    /// Strict governance
    #[must_use]
    pub fn strict() -> Self {
        Self {
            mode: GovernanceMode::Strict,
        }
    }

    /// Set the mode
    #[must_use]
    pub fn with_mode(mut self, mode: GovernanceMode) -> Self {
        self.mode = mode;
        self
    }
}
