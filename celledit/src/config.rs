//! Engine configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::flatten::FlattenOptions;
use crate::replicate::{ReplicateOptions, DEFAULT_MOVE_RETRY_LIMIT};

/// Configuration for replication and flattening.
///
/// Every field has a default, so a partial file is valid.
///
/// # Examples
///
/// ```
/// use celledit::config::EditConfig;
/// use celledit::flatten::Depth;
///
/// let config = EditConfig::from_toml_str(r#"
///     move_retry_limit = 10
///
///     [flatten]
///     depth = "all"
/// "#).unwrap();
/// assert_eq!(config.move_retry_limit, 10);
/// assert_eq!(config.flatten.depth, Depth::All);
/// assert!(config.replicate.use_existing);
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// The cap on failed replacements per containing cell when moving.
    pub move_retry_limit: usize,
    /// Default replication options.
    pub replicate: ReplicateOptions,
    /// Default flattening options.
    pub flatten: FlattenOptions,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            move_retry_limit: DEFAULT_MOVE_RETRY_LIMIT,
            replicate: ReplicateOptions::default(),
            flatten: FlattenOptions::default(),
        }
    }
}

impl EditConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("failed to parse config file `{}`", path.display()))
    }
}
