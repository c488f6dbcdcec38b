//! SQL predicate probes.
//!
//! Search (`$`) and range-expression (`{}` with a string value) conditions are
//! decided by the database. The prober describes the predicate as a
//! structured [`WhereClause`] and hands it to the SQL collaborator, which binds
//! the subject value and every operand as query parameters. Field names are
//! never interpolated: [`Logic::parse`](crate::logic::Logic::parse) only
//! accepts plain identifiers, and the clause carries no field text beyond that.

use crate::error::StructureError;
use crate::logic::{Combinator, ConditionKind, Logic};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::fmt;
use tessera_core::document::{Document, KEY_COUNT, value_to_text};
use tessera_core::method::RequestMethod;

/// Comparison operator of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    // Longest tokens first.
    const TOKENS: [(&'static str, CompareOp); 7] = [
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("!=", CompareOp::Ne),
        ("<>", CompareOp::Ne),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
        ("=", CompareOp::Eq),
    ];

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// One `op operand` term of a range expression.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeClause {
    pub op: CompareOp,
    /// A JSON number or string.
    pub operand: Value,
}

/// Parse a range expression such as `>=0,<10` or `!='draft'`.
///
/// Terms are comma separated; a term without an operator means `=`. Operands
/// are numbers or single-quoted strings, which may contain commas.
pub fn parse_range(expression: &str) -> Result<Vec<RangeClause>, StructureError> {
    let mut clauses = Vec::new();
    for term in split_terms(expression).into_iter().map(str::trim) {
        if term.is_empty() {
            return Err(StructureError::configuration(format!(
                "range expression '{}' has an empty term",
                expression
            )));
        }

        let (op, operand) = CompareOp::TOKENS
            .iter()
            .find_map(|(token, op)| term.strip_prefix(token).map(|rest| (*op, rest.trim())))
            .unwrap_or((CompareOp::Eq, term));

        clauses.push(RangeClause {
            op,
            operand: parse_operand(operand).ok_or_else(|| {
                StructureError::configuration(format!(
                    "range expression '{}': operand '{}' must be a number or a quoted string",
                    expression, operand
                ))
            })?,
        });
    }
    Ok(clauses)
}

fn split_terms(expression: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                terms.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&expression[start..]);
    terms
}

/// True if `value` can be compared with a number: a JSON number or a string
/// holding a finite decimal.
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(f64::is_finite),
        _ => false,
    }
}

fn parse_operand(operand: &str) -> Option<Value> {
    if operand.len() >= 2 && operand.starts_with('\'') && operand.ends_with('\'') {
        return Some(Value::String(operand[1..operand.len() - 1].to_string()));
    }
    if let Ok(n) = operand.parse::<i64>() {
        return Some(Value::from(n));
    }
    operand
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Predicate evaluated by a probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeCondition {
    /// `subject LIKE pattern` per pattern.
    Like(Vec<String>),
    /// `subject op operand` per clause.
    Compare(Vec<RangeClause>),
}

/// Structured where clause of a probe query.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// Field the subject was read from (for diagnostics only).
    pub field: String,
    /// The data value under test, as text.
    pub subject: String,
    /// How the terms of `condition` combine.
    pub combinator: Combinator,
    pub condition: ProbeCondition,
}

/// Query configuration handed to a [`SqlExecutor`].
#[derive(Debug, Clone)]
pub struct SqlConfig {
    method: RequestMethod,
    count: u32,
    page: u32,
    table: Option<String>,
    test: bool,
    wheres: Vec<WhereClause>,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            method: RequestMethod::Get,
            count: 0,
            page: 0,
            table: None,
            test: false,
            wheres: Vec::new(),
        }
    }
}

impl SqlConfig {
    pub fn set_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    /// Row limit; 0 means unlimited.
    pub fn set_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn set_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn set_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Test mode: the table is a label, not a stored relation.
    pub fn set_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn put_where(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn is_test(&self) -> bool {
        self.test
    }

    pub fn wheres(&self) -> &[WhereClause] {
        &self.wheres
    }
}

/// Executes a [`SqlConfig`] and returns one result row.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, config: &SqlConfig) -> anyhow::Result<Document>;

    /// Release resources held by the executor.
    async fn close(&self) {}
}

/// Produces query configurations and executors.
pub trait SqlCreator: Send + Sync {
    fn create_sql_config(&self) -> SqlConfig {
        SqlConfig::default()
    }

    fn create_sql_executor(&self) -> Box<dyn SqlExecutor>;
}

/// Resolves conditions that need a database-side comparison.
pub struct SqlProber<'a> {
    creator: &'a dyn SqlCreator,
    probe_table: &'a str,
}

impl<'a> SqlProber<'a> {
    pub fn new(creator: &'a dyn SqlCreator, probe_table: &'a str) -> Self {
        Self {
            creator,
            probe_table,
        }
    }

    /// Run a single-row existence probe; fails unless a row matches.
    pub async fn probe(
        &self,
        table: &str,
        key: &str,
        logic: &Logic,
        condition: &Value,
        subject: &Value,
    ) -> Result<(), StructureError> {
        let predicate = probe_condition(logic, condition)?;
        let numeric_range = matches!(
            &predicate,
            ProbeCondition::Compare(clauses) if clauses.iter().any(|c| c.operand.is_number())
        );
        if numeric_range && !is_numeric(subject) {
            tracing::debug!(table, key, "Non-numeric value against a numeric range");
            return Err(StructureError::validation_failed(
                table,
                logic.field(),
                key,
                &condition.to_string(),
            ));
        }

        let clause = WhereClause {
            field: logic.field().to_string(),
            subject: value_to_text(subject),
            combinator: logic.combinator(),
            condition: predicate,
        };

        let config = self
            .creator
            .create_sql_config()
            .set_method(RequestMethod::Head)
            .set_count(1)
            .set_page(0)
            .set_table(self.probe_table)
            .set_test(true)
            .put_where(clause);

        tracing::debug!(table, key, probe_table = self.probe_table, "Running probe query");

        let executor = self.creator.create_sql_executor();
        let result = executor.execute(&config).await;
        executor.close().await;
        let row = result.map_err(|e| StructureError::probe_failed(table, logic.field(), &e))?;

        let count = row.get(KEY_COUNT).and_then(Value::as_u64).unwrap_or(0);
        if count == 0 {
            return Err(StructureError::validation_failed(
                table,
                logic.field(),
                key,
                &condition.to_string(),
            ));
        }
        Ok(())
    }
}

fn probe_condition(logic: &Logic, condition: &Value) -> Result<ProbeCondition, StructureError> {
    match (logic.kind(), condition) {
        (ConditionKind::Search, Value::String(pattern)) => {
            Ok(ProbeCondition::Like(vec![pattern.clone()]))
        }
        (ConditionKind::Search, Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(ProbeCondition::Like)
            .ok_or_else(|| {
                StructureError::configuration(format!(
                    "search condition {}:{} must be a String or [String]",
                    logic, condition
                ))
            }),
        (ConditionKind::Range, Value::String(expression)) => {
            parse_range(expression).map(ProbeCondition::Compare)
        }
        _ => Err(StructureError::configuration(format!(
            "condition {}:{} cannot be resolved by a probe query",
            logic, condition
        ))),
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} ", self.combinator.as_char(), self.field)?;
        match &self.condition {
            ProbeCondition::Like(patterns) => write!(f, "LIKE {:?}", patterns),
            ProbeCondition::Compare(clauses) => {
                let terms: Vec<String> = clauses
                    .iter()
                    .map(|c| format!("{} {}", c.op.as_sql(), c.operand))
                    .collect();
                write!(f, "{}", terms.join(", "))
            }
        }
    }
}
