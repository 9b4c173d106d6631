//! Repository and autosave configuration

use crate::history::DEFAULT_HISTORY_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for an opened repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository name, stamped on audit events
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Undo steps retained
    pub history_depth: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: "architecture".to_string(),
            description: None,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl RepositoryConfig {
    /// Set the repository name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the undo depth
    #[must_use]
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }
}

/// Settings for the autosave task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Minimum seconds between saves
    pub interval_secs: u64,
    /// Target file; autosave is disabled when unset
    pub path: Option<PathBuf>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            path: None,
        }
    }
}

impl AutosaveConfig {
    /// Set the interval
    #[must_use]
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Set the target file
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: RepositoryConfig = serde_json::from_str(r#"{"name":"Acme"}"#).unwrap();
        assert_eq!(config.name, "Acme");
        assert_eq!(config.history_depth, DEFAULT_HISTORY_DEPTH);
    }

    #[test]
    fn autosave_disabled_without_path() {
        assert!(!AutosaveConfig::default().is_enabled());
        assert!(AutosaveConfig::default().with_path("a.json").is_enabled());
    }
}
