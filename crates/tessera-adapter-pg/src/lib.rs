//! Postgres collaborators for the structure walker.
//!
//! - [`PgSqlCreator`] answers probe queries for `$` and `{}` conditions
//! - [`PgUniqueChecker`] answers UNIQUE checks against stored rows
//!
//! Every value reaches the database as a bound parameter. Identifiers are
//! validated and quoted by [`quote_ident`].

use anyhow::Context;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions};
use sqlx::{Arguments, PgPool};
use std::str::FromStr;
use std::time::Duration;
use tessera_core::config::DatabaseConfig;

pub mod probe;
pub mod unique;

pub use probe::{PgProbeExecutor, PgSqlCreator, ProbeParam, build_probe_query};
pub use unique::{PgUniqueChecker, build_unique_query};

fn args_add<T>(args: &mut PgArguments, v: T) -> anyhow::Result<()>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| anyhow::anyhow!(e))
}

/// Quote a table or column name, rejecting anything but ASCII alphanumerics
/// and `_`.
pub fn quote_ident(ident: &str) -> anyhow::Result<String> {
    if ident.is_empty() {
        return Err(anyhow::anyhow!("empty identifier"));
    }
    if !ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow::anyhow!("invalid identifier '{}'", ident));
    }
    Ok(format!("\"{}\"", ident))
}

/// Open a connection pool from the `database` configuration section.
///
/// The configured statement timeout is applied to every session.
pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = config.resolve_url()?;
    let options = PgConnectOptions::from_str(&url)
        .context("invalid database URL")?
        .options([("statement_timeout", config.statement_timeout_ms.to_string())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
        .context("failed to connect to Postgres")?;

    tracing::info!(
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout_ms,
        "Connected to Postgres"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Moment").unwrap(), "\"Moment\"");
        assert_eq!(quote_ident("user_id").unwrap(), "\"user_id\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a\"b").is_err());
        assert!(quote_ident("a; DROP TABLE x").is_err());
        assert!(quote_ident("@role").is_err());
    }
}
