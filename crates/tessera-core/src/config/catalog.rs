//! Policy catalog.
//!
//! Every endpoint is identified by a request method and a tag (usually the
//! name of the table the request writes). Each (method, tag) pair may have
//! several versions of its policy document; a request asking for version `n`
//! is served the highest version not above `n`, and a request without a
//! version gets the latest.

use super::ConfigError;
use crate::document::Document;
use crate::method::RequestMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A single catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub method: RequestMethod,
    pub tag: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Policy document applied to the whole request or response.
    pub structure: Document,
}

/// Policy documents keyed by method, tag and version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyCatalog {
    #[serde(default)]
    entries: Vec<CatalogEntry>,
}

impl PolicyCatalog {
    /// Load a catalog from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Err(ConfigError::Config(format!(
                "unsupported catalog file '{}': expected .json, .yaml or .yml",
                path.display()
            ))),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    pub fn extend(&mut self, other: PolicyCatalog) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry serving `version` of (`method`, `tag`).
    pub fn lookup(
        &self,
        method: RequestMethod,
        tag: &str,
        version: Option<u32>,
    ) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.method == method && e.tag == tag)
            .filter(|e| version.is_none_or(|v| e.version <= v))
            .max_by_key(|e| e.version)
    }

    /// A fresh copy of the policy document for (`method`, `tag`, `version`).
    ///
    /// Walking a policy strips its directives, so every call gets its own copy.
    pub fn structure(
        &self,
        method: RequestMethod,
        tag: &str,
        version: Option<u32>,
    ) -> Option<Document> {
        self.lookup(method, tag, version).map(|e| e.structure.clone())
    }
}

fn default_version() -> u32 {
    1
}
