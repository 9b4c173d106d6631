//! `archgraph.toml`
//!
//! ```toml
//! [repository]
//! name = "Acme"
//! history_depth = 50
//!
//! [governance]
//! mode = "strict"
//!
//! [autosave]
//! interval_secs = 30
//! path = "acme.autosave.json"
//!
//! [logging]
//! filter = "archgraph=debug"
//! json = false
//! ```
//!
//! Every section and field is optional.

use archgraph_governance::{GovernanceConfig, GovernanceMode};
use archgraph_repository::{AutosaveConfig, RepositoryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration could not be loaded
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        /// Offending file
        path: PathBuf,
        /// Underlying failure
        source: std::io::Error,
    },

    /// Not valid TOML for [`ArchgraphConfig`]
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `[logging]` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Set the filter directive
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Toggle JSON output
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Whole CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchgraphConfig {
    /// `[repository]`
    pub repository: RepositoryConfig,
    /// `[governance]`
    pub governance: GovernanceConfig,
    /// `[autosave]`
    pub autosave: AutosaveConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

impl ArchgraphConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed input or unknown enum values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a file
    ///
    /// # Errors
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Replace `[repository]`
    #[must_use]
    pub fn with_repository(mut self, repository: RepositoryConfig) -> Self {
        self.repository = repository;
        self
    }

    /// Set the governance mode
    #[must_use]
    pub fn with_governance_mode(mut self, mode: GovernanceMode) -> Self {
        self.governance = self.governance.with_mode(mode);
        self
    }

    /// Replace `[autosave]`
    #[must_use]
    pub fn with_autosave(mut self, autosave: AutosaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    /// Replace `[logging]`
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(
            ArchgraphConfig::from_toml_str("").unwrap(),
            ArchgraphConfig::default()
        );
    }

    #[test]
    fn sections_override_defaults() {
        let config = ArchgraphConfig::from_toml_str(
            r#"
            [repository]
            name = "Acme"

            [governance]
            mode = "strict"

            [autosave]
            path = "acme.json"

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.repository.name, "Acme");
        assert_eq!(
            config.repository.history_depth,
            RepositoryConfig::default().history_depth
        );
        assert_eq!(config.governance.mode, GovernanceMode::Strict);
        assert_eq!(config.autosave.interval_secs, 30);
        assert!(config.autosave.is_enabled());
        assert_eq!(config.logging, LoggingConfig::default().with_json(true));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = ArchgraphConfig::from_toml_str("[governance]\nmode = \"lenient\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
