//! UNIQUE checks against stored rows.

use crate::{args_add, quote_ident};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Row};
use tessera_core::document::{KEY_ID, value_to_text};
use tessera_structure::{StructureError, UniqueChecker};

/// Render the duplicate count query for `table.field`.
///
/// `$1` is the value as text; `$2`, when `except_id` is set, the id to skip.
pub fn build_unique_query(table: &str, field: &str, except_id: i64) -> anyhow::Result<String> {
    let mut sql = format!(
        "SELECT count(*) AS cnt FROM {} WHERE {}::text = $1",
        quote_ident(table)?,
        quote_ident(field)?
    );
    if except_id != 0 {
        sql.push_str(&format!(" AND {} <> $2", quote_ident(KEY_ID)?));
    }
    Ok(sql)
}

/// Looks for other rows already holding a value.
#[derive(Clone)]
pub struct PgUniqueChecker {
    pool: PgPool,
}

impl PgUniqueChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(
        &self,
        table: &str,
        field: &str,
        value: &Value,
        except_id: i64,
    ) -> anyhow::Result<i64> {
        let sql = build_unique_query(table, field, except_id)?;
        let mut args = PgArguments::default();
        args_add(&mut args, value_to_text(value))?;
        if except_id != 0 {
            args_add(&mut args, except_id)?;
        }

        let row = sqlx::query_with(&sql, args).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("cnt")?)
    }
}

#[async_trait]
impl UniqueChecker for PgUniqueChecker {
    async fn check_unique(
        &self,
        table: &str,
        field: &str,
        value: &Value,
        except_id: i64,
    ) -> Result<(), StructureError> {
        let count = self
            .count(table, field, value, except_id)
            .await
            .map_err(|e| StructureError::probe_failed(table, field, &e))?;

        tracing::debug!(table, field, except_id, count, "UNIQUE check");
        if count > 0 {
            return Err(StructureError::duplicate_value(table, field, &value_to_text(value)));
        }
        Ok(())
    }
}
