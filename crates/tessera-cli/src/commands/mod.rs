//! CLI command implementations.

pub mod check;
pub mod shape;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_adapter_pg::{PgSqlCreator, PgUniqueChecker};
use tessera_core::config::TesseraConfig;
use tessera_core::document::Document;
use tessera_core::method::RequestMethod;
use tessera_structure::{StructureError, StructureWalker};

/// Selects the configuration and the policy to apply.
#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Configuration file
    #[arg(long, short, default_value = "tessera.yaml")]
    pub config: PathBuf,

    /// Request method the policy is registered under (GET, POST, PUT, ...)
    #[arg(long, short)]
    pub method: RequestMethod,

    /// Policy tag, usually the table the endpoint writes
    #[arg(long, short)]
    pub tag: String,

    /// Policy version (latest when omitted)
    #[arg(long = "policy-version")]
    pub policy_version: Option<u32>,

    /// Do not connect to the configured database
    #[arg(long, default_value_t = false)]
    pub offline: bool,
}

/// Everything a command needs to walk one document.
pub struct Session {
    pub walker: StructureWalker,
    pub policy: Document,
}

impl PolicyArgs {
    /// Load the configuration, look up the policy and build the walker.
    pub async fn open(&self) -> Result<Session> {
        let config = TesseraConfig::load_with_context(&self.config)
            .with_context(|| format!("failed to load {}", self.config.display()))?;
        tracing::debug!(entries = config.catalog.len(), "Loaded policy catalog");

        let policy = config
            .catalog
            .structure(self.method, &self.tag, self.policy_version)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no policy for {} '{}'{}",
                    self.method,
                    self.tag,
                    self.policy_version
                        .map(|v| format!(" at version {}", v))
                        .unwrap_or_default()
                )
            })?;

        let mut walker = StructureWalker::new(config.structure.clone());
        match (&config.database, self.offline) {
            (Some(database), false) => {
                let pool = tessera_adapter_pg::connect(database).await?;
                walker = walker
                    .with_sql_creator(Arc::new(PgSqlCreator::new(pool.clone())))
                    .with_unique_checker(Arc::new(PgUniqueChecker::new(pool)));
            }
            (Some(_), true) => tracing::info!("Offline: probe and UNIQUE checks are unavailable"),
            (None, _) => tracing::debug!("No database configured"),
        }

        Ok(Session { walker, policy })
    }
}

/// Read a JSON object from `path`.
pub fn read_document(path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    match value {
        Value::Object(document) => Ok(document),
        other => Err(anyhow::anyhow!(
            "{} must hold a JSON object, found {}",
            path.display(),
            type_name(&other)
        )),
    }
}

pub fn print_document(document: &Document) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(document)?);
    Ok(())
}

/// Turn a walk failure into a CLI error naming its kind and location.
pub fn rejection(err: StructureError) -> anyhow::Error {
    let location = match (&err.table, &err.field) {
        (Some(table), Some(field)) => format!(" at {}.{}", table, field),
        (Some(table), None) => format!(" at {}", table),
        _ => String::new(),
    };
    let kind = err.kind;
    anyhow::Error::new(err).context(format!("{}{}", kind, location))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    pub(crate) const CONFIG: &str = r#"
structure:
  max_batch_ids: 3
catalog:
  entries:
    - method: PUT
      tag: Moment
      structure:
        Moment:
          NECESSARY: content
          PUT:
            edited: true
    - method: GET
      tag: Moment
      structure:
        REMOVE: token
"#;

    pub(crate) fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    pub(crate) fn args(config: PathBuf, method: RequestMethod) -> PolicyArgs {
        PolicyArgs {
            config,
            method,
            tag: "Moment".to_string(),
            policy_version: None,
            offline: false,
        }
    }

    #[test]
    fn test_read_document_requires_object() {
        let dir = TempDir::new().unwrap();
        let ok = write(&dir, "ok.json", r#"{"a": 1}"#);
        assert_eq!(read_document(&ok).unwrap().len(), 1);

        let list = write(&dir, "list.json", "[1]");
        let err = read_document(&list).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[tokio::test]
    async fn test_open_unknown_policy() {
        let dir = TempDir::new().unwrap();
        let config = write(&dir, "tessera.yaml", CONFIG);
        let err = args(config, RequestMethod::Delete).open().await.err().unwrap();
        assert!(err.to_string().contains("no policy for DELETE 'Moment'"));
    }

    #[test]
    fn test_rejection_names_kind_and_location() {
        let err = rejection(StructureError::forbidden_field(
            "Moment",
            "id",
            &["id".to_string()],
        ));
        assert_eq!(err.to_string(), "forbidden_field at Moment.id");
    }
}
