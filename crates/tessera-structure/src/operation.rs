//! Governance directives and their application.
//!
//! Mapping directives (`VERIFY`, `ADD`, `PUT`, `REPLACE`) carry `field: value`
//! pairs; list directives (`UNIQUE`, `REMOVE`, `NECESSARY`, `DISALLOW`) carry
//! field names.

use crate::error::StructureError;
use crate::verify::ConditionEvaluator;
use std::fmt;
use tessera_core::document::Document;

/// A governance directive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Check each condition; never mutates.
    Verify,
    /// Set a field only if it is absent.
    Add,
    /// Always set a field.
    Put,
    /// Set a field only if it is present.
    Replace,
    /// Reject values already stored in another row.
    Unique,
    /// Delete fields before anything else runs.
    Remove,
    /// Require fields to be present and non-null.
    Necessary,
    /// Reject fields.
    Disallow,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::Verify,
        Operation::Add,
        Operation::Put,
        Operation::Replace,
        Operation::Unique,
        Operation::Remove,
        Operation::Necessary,
        Operation::Disallow,
    ];

    /// The policy key carrying this directive.
    pub fn key(self) -> &'static str {
        match self {
            Operation::Verify => "VERIFY",
            Operation::Add => "ADD",
            Operation::Put => "PUT",
            Operation::Replace => "REPLACE",
            Operation::Unique => "UNIQUE",
            Operation::Remove => "REMOVE",
            Operation::Necessary => "NECESSARY",
            Operation::Disallow => "DISALLOW",
        }
    }

    /// True if the directive is a `field: value` mapping.
    pub fn takes_mapping(self) -> bool {
        matches!(
            self,
            Operation::Verify | Operation::Add | Operation::Put | Operation::Replace
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Apply a mapping directive to `real`, in the directive's insertion order.
pub async fn apply(
    operation: Operation,
    table: &str,
    directive: Option<&Document>,
    real: &mut Document,
    evaluator: &ConditionEvaluator<'_>,
) -> Result<(), StructureError> {
    let Some(directive) = directive else {
        return Ok(());
    };

    for (key, value) in directive {
        match operation {
            Operation::Verify => evaluator.verify(table, key, value, real).await?,
            Operation::Put => {
                real.insert(key.clone(), value.clone());
            }
            Operation::Add => {
                if !real.contains_key(key) {
                    real.insert(key.clone(), value.clone());
                }
            }
            Operation::Replace => {
                if real.contains_key(key) {
                    real.insert(key.clone(), value.clone());
                }
            }
            Operation::Unique | Operation::Remove | Operation::Necessary | Operation::Disallow => {
                return Err(StructureError::configuration(format!(
                    "{} is not a mapping operation",
                    operation
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PatternCache;
    use serde_json::{Value, json};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn run(operation: Operation, directive: Value, real: Value) -> Result<Document, StructureError> {
        let cache = PatternCache::new();
        let evaluator = ConditionEvaluator::new(&cache, None, "Test");
        let mut real = doc(real);
        apply(operation, "Moment", Some(&doc(directive)), &mut real, &evaluator).await?;
        Ok(real)
    }

    #[test]
    fn test_keys() {
        let keys: Vec<&str> = Operation::ALL.iter().map(|op| op.key()).collect();
        assert_eq!(
            keys,
            ["VERIFY", "ADD", "PUT", "REPLACE", "UNIQUE", "REMOVE", "NECESSARY", "DISALLOW"]
        );
        assert_eq!(Operation::Replace.to_string(), "REPLACE");
    }

    #[tokio::test]
    async fn test_add_only_when_absent() {
        let real = run(Operation::Add, json!({"a": 1, "b": 2}), json!({"a": 0})).await.unwrap();
        assert_eq!(Value::Object(real), json!({"a": 0, "b": 2}));
    }

    #[tokio::test]
    async fn test_put_always_wins() {
        let real = run(Operation::Put, json!({"a": 9}), json!({"a": 0})).await.unwrap();
        assert_eq!(Value::Object(real), json!({"a": 9}));
    }

    #[tokio::test]
    async fn test_replace_only_when_present() {
        let real = run(Operation::Replace, json!({"a": 2, "b": 3}), json!({"a": 1})).await.unwrap();
        assert_eq!(Value::Object(real), json!({"a": 2}));
    }

    #[tokio::test]
    async fn test_verify_does_not_mutate() {
        let real = run(Operation::Verify, json!({"a{}": [1, 2]}), json!({"a": 1})).await.unwrap();
        assert_eq!(Value::Object(real), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_missing_directive_is_noop() {
        let cache = PatternCache::new();
        let evaluator = ConditionEvaluator::new(&cache, None, "Test");
        let mut real = doc(json!({"a": 1}));
        apply(Operation::Put, "Moment", None, &mut real, &evaluator).await.unwrap();
        assert_eq!(Value::Object(real), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_list_operations_rejected() {
        let err = run(Operation::Remove, json!({"a": 1}), json!({})).await.unwrap_err();
        assert_eq!(err.kind, crate::error::StructureErrorKind::Configuration);
    }
}
