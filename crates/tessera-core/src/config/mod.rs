//! Configuration types for Tessera.
//!
//! Configuration is loaded from a single YAML file (`tessera.yaml`):
//!
//! ```yaml
//! structure:
//!   probe_table: Test
//!   max_batch_ids: 10
//! database:
//!   database_url_env: DATABASE_URL
//!   statement_timeout_ms: 5000
//! catalog_file: catalog.yaml
//! ```
//!
//! The policy catalog can be given inline (`catalog:`) or in a separate YAML or
//! JSON file referenced by `catalog_file`, resolved relative to the
//! configuration file.

pub mod catalog;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use catalog::{CatalogEntry, PolicyCatalog};

/// Complete Tessera configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseraConfig {
    /// Structure walker settings.
    #[serde(default)]
    pub structure: StructureConfig,

    /// Database used for probe queries and uniqueness checks.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Path to a catalog file (alternative to inline).
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    /// Inline policy catalog.
    #[serde(default)]
    pub catalog: PolicyCatalog,
}

impl TesseraConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve the catalog file reference.
    ///
    /// Entries from `catalog_file` are appended to the inline catalog.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(catalog_file) = &config.catalog_file {
            let catalog_path = if catalog_file.is_absolute() {
                catalog_file.clone()
            } else {
                base_dir.join(catalog_file)
            };
            let catalog = PolicyCatalog::from_file(&catalog_path)?;
            config.catalog.extend(catalog);
        }

        config.structure.validate()?;
        Ok(config)
    }
}

/// Structure walker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Table named in probe queries. Probes never read it; it only labels the
    /// single-row relation the predicate is evaluated against.
    #[serde(default = "default_probe_table")]
    pub probe_table: String,

    /// Maximum number of entries in a batch identifier array (`id{}`).
    #[serde(default = "default_max_batch_ids")]
    pub max_batch_ids: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            probe_table: default_probe_table(),
            max_batch_ids: default_max_batch_ids(),
        }
    }
}

impl StructureConfig {
    /// Reject settings the walker cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !crate::document::is_table_key(&self.probe_table) {
            return Err(ConfigError::Config(format!(
                "structure.probe_table '{}' must be a capitalized identifier",
                self.probe_table
            )));
        }
        if self.max_batch_ids == 0 {
            return Err(ConfigError::Config(
                "structure.max_batch_ids must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Postgres connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Direct database URL (for development only).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Environment variable containing the database URL (recommended).
    #[serde(default)]
    pub database_url_env: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Server-side statement timeout applied to every connection.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_url_env: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database URL, preferring the environment variable.
    pub fn resolve_url(&self) -> Result<String, ConfigError> {
        if let Some(var) = &self.database_url_env {
            if let Ok(url) = std::env::var(var) {
                return Ok(url);
            }
        }
        self.database_url.clone().ok_or_else(|| {
            ConfigError::Config(
                "database.database_url or database.database_url_env must be set".to_string(),
            )
        })
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn default_probe_table() -> String {
    "Test".to_string()
}

fn default_max_batch_ids() -> usize {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

fn default_statement_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TesseraConfig::from_yaml("{}").unwrap();
        assert_eq!(config.structure.probe_table, "Test");
        assert_eq!(config.structure.max_batch_ids, 10);
        assert!(config.database.is_none());
        assert!(config.catalog.is_empty());
    }

    #[test]
    fn test_invalid_structure_config() {
        let config = StructureConfig {
            probe_table: "test; DROP".to_string(),
            max_batch_ids: 10,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Config(_))));

        let config = StructureConfig {
            max_batch_ids: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url_resolution() {
        let config = DatabaseConfig {
            database_url: Some("postgres://localhost/app".to_string()),
            database_url_env: Some("TESSERA_TEST_UNSET_DATABASE_URL".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_url().unwrap(), "postgres://localhost/app");

        let config = DatabaseConfig::default();
        assert!(config.resolve_url().is_err());
    }

    #[test]
    fn test_load_with_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.yaml");
        let mut f = fs::File::create(&catalog_path).unwrap();
        writeln!(
            f,
            "entries:\n  - method: POST\n    tag: Moment\n    structure:\n      Moment:\n        DISALLOW: id"
        )
        .unwrap();

        let config_path = dir.path().join("tessera.yaml");
        fs::write(
            &config_path,
            "structure:\n  max_batch_ids: 5\ncatalog_file: catalog.yaml\n",
        )
        .unwrap();

        let config = TesseraConfig::load_with_context(&config_path).unwrap();
        assert_eq!(config.structure.max_batch_ids, 5);
        assert_eq!(config.catalog.len(), 1);
    }
}
