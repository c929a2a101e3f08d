//! Configuration management for doc-composer.
//!
//! Handles loading composer options from TOML files. Store connections and
//! credentials are not configured here; callers inject a ready store handle.

use crate::error::{ComposeError, Result};
use crate::query::JoinKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Options applied to every composer built from this config.
    #[serde(default)]
    pub composer: ComposerOptions,
}

/// Tunables for a [`Composer`](crate::Composer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposerOptions {
    /// How results of parallel range queries are matched up.
    #[serde(default)]
    pub join_key: JoinKey,

    /// Maximum in-flight deletes/updates during `delete_matching` and
    /// `update_matching`.
    #[serde(default = "default_mutation_concurrency")]
    pub mutation_concurrency: usize,

    /// Maximum candidates for `in`, `not-in`, and `array-contains-any`.
    #[serde(default = "default_max_value_set")]
    pub max_value_set: usize,
}

fn default_mutation_concurrency() -> usize {
    16
}

fn default_max_value_set() -> usize {
    30
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            join_key: JoinKey::default(),
            mutation_concurrency: default_mutation_concurrency(),
            max_value_set: default_max_value_set(),
        }
    }
}

impl ComposerOptions {
    /// Checks that every option is in range.
    pub fn validate(&self) -> Result<()> {
        if self.mutation_concurrency == 0 {
            return Err(ComposeError::config("mutation_concurrency must be at least 1"));
        }
        if self.max_value_set == 0 {
            return Err(ComposeError::config("max_value_set must be at least 1"));
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doc-composer")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ComposeError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ComposeError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.composer.validate()?;
        Ok(config)
    }
}
