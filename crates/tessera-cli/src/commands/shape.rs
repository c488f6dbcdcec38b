//! `tessera shape` command implementation.
//!
//! Walks a response payload with its policy and prints the shaped response.
//! Nested objects are kept as they are.

use anyhow::Result;
use std::path::Path;
use tessera_core::document::Document;

use super::{PolicyArgs, print_document, read_document, rejection};

/// Shape `response` and return the result.
pub async fn execute(args: &PolicyArgs, response: &Path) -> Result<Document> {
    let session = args.open().await?;
    let payload = read_document(response)?;

    tracing::info!(method = %args.method, tag = %args.tag, "Shaping response");
    let shaped = session
        .walker
        .parse_response(args.method, &args.tag, Some(session.policy), Some(payload), None)
        .await
        .map_err(rejection)?;

    Ok(shaped.unwrap_or_default())
}

pub async fn run(args: &PolicyArgs, response: &Path) -> Result<()> {
    let shaped = execute(args, response).await?;
    print_document(&shaped)
}
