//! Probe queries.
//!
//! A probe evaluates a predicate over the subject value alone, against a
//! one-row relation labelled with the probe table name:
//!
//! ```sql
//! SELECT count(*) AS count FROM (
//!     SELECT 1 FROM (VALUES (1)) AS "Test"(probe) WHERE <predicate> LIMIT 1
//! ) AS hit
//! ```

use crate::{args_add, quote_ident};
use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Row};
use tessera_core::document::{Document, KEY_COUNT};
use tessera_structure::{Combinator, ProbeCondition, SqlConfig, SqlCreator, SqlExecutor, WhereClause};

/// Text Postgres accepts as a finite `numeric`. Subjects that do not match
/// compare as NULL, so they match no row instead of raising a cast error.
const NUMERIC_TEXT: &str =
    "^[[:space:]]*[-+]?([0-9]+[.]?[0-9]*|[.][0-9]+)([eE][-+]?[0-9]+)?[[:space:]]*$";

fn numeric_subject(subject: &str) -> String {
    format!(
        "CAST(CASE WHEN {subject} ~ '{NUMERIC_TEXT}' THEN {subject} END AS numeric)"
    )
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeParam {
    Text(String),
    Int(i64),
    Float(f64),
}

impl ProbeParam {
    fn bind(self, args: &mut PgArguments) -> anyhow::Result<()> {
        match self {
            ProbeParam::Text(v) => args_add(args, v),
            ProbeParam::Int(v) => args_add(args, v),
            ProbeParam::Float(v) => args_add(args, v),
        }
    }
}

struct QueryBuilder {
    params: Vec<ProbeParam>,
}

impl QueryBuilder {
    fn push(&mut self, param: ProbeParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn predicate(&mut self, clause: &WhereClause) -> anyhow::Result<String> {
        let subject = self.push(ProbeParam::Text(clause.subject.clone()));

        let terms = match &clause.condition {
            ProbeCondition::Like(patterns) => patterns
                .iter()
                .map(|p| format!("{} LIKE {}", subject, self.push(ProbeParam::Text(p.clone()))))
                .collect::<Vec<_>>(),
            ProbeCondition::Compare(clauses) => {
                let mut terms = Vec::with_capacity(clauses.len());
                for c in clauses {
                    let term = match &c.operand {
                        Value::String(s) => {
                            let operand = self.push(ProbeParam::Text(s.clone()));
                            format!("{} {} {}", subject, c.op.as_sql(), operand)
                        }
                        Value::Number(n) => {
                            let param = match n.as_i64() {
                                Some(i) => ProbeParam::Int(i),
                                None => ProbeParam::Float(n.as_f64().ok_or_else(|| {
                                    anyhow::anyhow!("operand {} out of range", n)
                                })?),
                            };
                            let operand = self.push(param);
                            format!("{} {} {}", numeric_subject(&subject), c.op.as_sql(), operand)
                        }
                        other => {
                            return Err(anyhow::anyhow!(
                                "unsupported range operand {} for '{}'",
                                other,
                                clause.field
                            ));
                        }
                    };
                    terms.push(term);
                }
                terms
            }
        };

        if terms.is_empty() {
            return Err(anyhow::anyhow!("empty condition for '{}'", clause.field));
        }

        Ok(match clause.combinator {
            Combinator::And => format!("({})", terms.join(" AND ")),
            Combinator::Or => format!("({})", terms.join(" OR ")),
            Combinator::Not => format!("NOT ({})", terms.join(" OR ")),
        })
    }
}

/// Render a probe configuration to SQL and its parameters.
pub fn build_probe_query(config: &SqlConfig) -> anyhow::Result<(String, Vec<ProbeParam>)> {
    if !config.is_test() {
        return Err(anyhow::anyhow!("only test-mode probe queries are supported"));
    }
    if !config.method().is_query_method() {
        return Err(anyhow::anyhow!(
            "probe queries must use a query method, got {}",
            config.method()
        ));
    }
    let table = config
        .table()
        .ok_or_else(|| anyhow::anyhow!("probe query is missing its table"))?;

    let mut builder = QueryBuilder { params: Vec::new() };
    let mut predicates = Vec::with_capacity(config.wheres().len());
    for clause in config.wheres() {
        predicates.push(builder.predicate(clause)?);
    }
    let predicate = if predicates.is_empty() {
        "TRUE".to_string()
    } else {
        predicates.join(" AND ")
    };

    let mut inner = format!(
        "SELECT 1 FROM (VALUES (1)) AS {}(probe) WHERE {}",
        quote_ident(table)?,
        predicate
    );
    if config.count() > 0 {
        inner.push_str(&format!(" LIMIT {}", config.count()));
        if config.page() > 0 {
            inner.push_str(&format!(
                " OFFSET {}",
                u64::from(config.page()) * u64::from(config.count())
            ));
        }
    }

    Ok((
        format!("SELECT count(*) AS count FROM ({}) AS hit", inner),
        builder.params,
    ))
}

/// Creates [`PgProbeExecutor`]s sharing one pool.
#[derive(Clone)]
pub struct PgSqlCreator {
    pool: PgPool,
}

impl PgSqlCreator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SqlCreator for PgSqlCreator {
    fn create_sql_executor(&self) -> Box<dyn SqlExecutor> {
        Box::new(PgProbeExecutor {
            pool: self.pool.clone(),
        })
    }
}

/// Executes probe queries on a pooled connection.
pub struct PgProbeExecutor {
    pool: PgPool,
}

#[async_trait]
impl SqlExecutor for PgProbeExecutor {
    async fn execute(&self, config: &SqlConfig) -> anyhow::Result<Document> {
        let (sql, params) = build_probe_query(config)?;
        tracing::debug!(sql = %sql, params = params.len(), "Executing probe query");

        let mut args = PgArguments::default();
        for param in params {
            param.bind(&mut args)?;
        }

        let row = sqlx::query_with(&sql, args).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(KEY_COUNT)?;

        let mut result = Document::new();
        result.insert(KEY_COUNT.to_string(), json!(count));
        Ok(result)
    }
}
