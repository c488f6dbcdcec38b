//! UNIQUE checks.

use crate::error::StructureError;
use async_trait::async_trait;
use serde_json::Value;
use tessera_core::document::{Document, KEY_ID};

/// Storage-backed duplicate detection.
#[async_trait]
pub trait UniqueChecker: Send + Sync {
    /// Fail with a `DuplicateValue` error if another row of `table` already
    /// stores `value` in `field`. Rows with id `except_id` are ignored;
    /// `except_id == 0` ignores nothing.
    async fn check_unique(
        &self,
        table: &str,
        field: &str,
        value: &Value,
        except_id: i64,
    ) -> Result<(), StructureError>;
}

/// Run every UNIQUE field of `real` through `checker`.
pub(crate) async fn verify_unique(
    checker: Option<&dyn UniqueChecker>,
    table: &str,
    fields: &[String],
    real: &Document,
) -> Result<(), StructureError> {
    if fields.is_empty() {
        return Ok(());
    }
    let Some(checker) = checker else {
        return Err(StructureError::configuration(format!(
            "UNIQUE [{}] in '{}' needs a uniqueness checker but none is configured",
            fields.join(","),
            table
        )));
    };

    let except_id = real.get(KEY_ID).and_then(Value::as_i64).unwrap_or(0);

    for field in fields {
        match real.get(field) {
            None => {}
            Some(Value::Null) => {
                tracing::warn!(table, field = %field, "Skipping UNIQUE check on null value");
            }
            Some(Value::Object(_)) | Some(Value::Array(_)) => {
                return Err(StructureError::unexpected_type(table, field, "a scalar"));
            }
            Some(value) => checker.check_unique(table, field, value, except_id).await?,
        }
    }
    Ok(())
}
