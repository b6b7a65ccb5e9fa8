//! Configuration for the query engine.
//!
//! Config file resolution order:
//! 1. Explicit path passed to `Config::load_from()`
//! 2. MLQUERY_CONFIG environment variable
//! 3. Default: `<config dir>/mlquery/config.toml`
//!
//! A missing file means the built-in experiment field table.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::registry::{default_fields, FieldSpec, Registry, DEFAULT_PRIMARY_KEY};
use crate::{Error, Result};

/// Environment variable naming the config file.
pub const CONFIG_VAR: &str = "MLQUERY_CONFIG";

/// Query engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Datastore field that the `id` query field aliases.
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Page size used by `find` when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Render date-times as Unix seconds instead of ISO-8601 text.
    #[serde(default)]
    pub use_timestamp: bool,

    /// Queryable fields, in all-fields expansion order.
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSpec>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            default_limit: default_limit(),
            use_timestamp: false,
            fields: default_fields(),
        }
    }
}

impl Config {
    /// Load config using the standard resolution order.
    pub fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
            tracing::debug!(path = %path.display(), fields = config.fields.len(), "loaded config");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build the field registry this config describes.
    pub fn registry(&self) -> Result<Registry> {
        Registry::new(self.primary_key.clone(), self.fields.clone())
    }
}

/// Default config file location (platform config directory).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mlquery").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Resolve the config file path using the standard resolution order.
fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_VAR) {
        return Some(PathBuf::from(path));
    }
    default_config_path()
}
