//! `tessera check` command implementation.
//!
//! Runs a request payload through its policy: pre-checks, shape rules,
//! operations and conditions. Prints the transformed request on success.

use anyhow::Result;
use std::path::Path;
use tessera_core::document::Document;

use super::{PolicyArgs, print_document, read_document, rejection};

/// Check `request` and return the transformed payload.
pub async fn execute(args: &PolicyArgs, request: &Path) -> Result<Document> {
    let session = args.open().await?;
    let payload = read_document(request)?;

    tracing::info!(method = %args.method, tag = %args.tag, "Checking request");
    let checked = session
        .walker
        .parse_request(args.method, &args.tag, Some(session.policy), Some(payload))
        .await
        .map_err(rejection)?;

    Ok(checked.unwrap_or_default())
}

pub async fn run(args: &PolicyArgs, request: &Path) -> Result<()> {
    let checked = execute(args, request).await?;
    print_document(&checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{CONFIG, args, write};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tessera_core::method::RequestMethod;

    #[tokio::test]
    async fn test_check_applies_policy() {
        let dir = TempDir::new().unwrap();
        let config = write(&dir, "tessera.yaml", CONFIG);
        let request = write(&dir, "request.json", r#"{"Moment": {"id": 1, "content": "hi"}}"#);

        let checked = execute(&args(config, RequestMethod::Put), &request).await.unwrap();
        assert_eq!(
            Value::Object(checked),
            json!({"Moment": {"id": 1, "content": "hi", "edited": true}})
        );
    }

    #[tokio::test]
    async fn test_check_rejects_violations() {
        let dir = TempDir::new().unwrap();
        let config = write(&dir, "tessera.yaml", CONFIG);

        let request = write(&dir, "missing.json", r#"{"Moment": {"id": 1}}"#);
        let err = execute(&args(config.clone(), RequestMethod::Put), &request)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("missing_field"));

        let request = write(&dir, "batch.json", r#"{"Moment": {"id{}": [1, 2, 3, 4], "content": "x"}}"#);
        let err = execute(&args(config, RequestMethod::Put), &request)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid_identifier"));
    }
}
