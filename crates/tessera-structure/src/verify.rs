//! VERIFY condition evaluation.

use crate::error::StructureError;
use crate::logic::{ConditionKind, Logic};
use crate::matcher;
use crate::pattern::PatternCache;
use crate::probe::{SqlCreator, SqlProber};
use serde_json::Value;
use tessera_core::document::Document;

/// Evaluates VERIFY entries against a data document.
pub struct ConditionEvaluator<'a> {
    patterns: &'a PatternCache,
    sql: Option<&'a dyn SqlCreator>,
    probe_table: &'a str,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(
        patterns: &'a PatternCache,
        sql: Option<&'a dyn SqlCreator>,
        probe_table: &'a str,
    ) -> Self {
        Self {
            patterns,
            sql,
            probe_table,
        }
    }

    /// Check `key: condition` against `real`.
    ///
    /// A null or absent data value has nothing to verify and always passes.
    pub async fn verify(
        &self,
        table: &str,
        key: &str,
        condition: &Value,
        real: &Document,
    ) -> Result<(), StructureError> {
        if condition.is_null() {
            return Err(StructureError::configuration(format!(
                "VERIFY {}:null in '{}' has no condition",
                key, table
            )));
        }

        let logic = Logic::parse(key)?;
        let value = match real.get(logic.field()) {
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        let holds = match (logic.kind(), condition) {
            (ConditionKind::Search, _) | (ConditionKind::Range, Value::String(_)) => {
                return self.probe(table, key, &logic, condition, value).await;
            }
            (ConditionKind::Regex, _) => {
                matcher::matches_patterns(self.patterns, logic.combinator(), condition, value)?
            }
            (ConditionKind::Range, Value::Array(allowed)) => {
                matcher::matches_membership(logic.combinator(), allowed, value)
            }
            (ConditionKind::Range, _) => {
                return Err(StructureError::configuration(format!(
                    "VERIFY {}:{} in '{}' must be a String or an Array",
                    key, condition, table
                )));
            }
            (ConditionKind::Intersect, _) => match value {
                Value::Array(items) => {
                    matcher::matches_intersection(logic.combinator(), condition, items)
                }
                _ => {
                    return Err(StructureError::unexpected_type(table, logic.field(), "an Array"));
                }
            },
        };

        if holds {
            Ok(())
        } else {
            Err(StructureError::validation_failed(
                table,
                logic.field(),
                key,
                &condition.to_string(),
            ))
        }
    }

    async fn probe(
        &self,
        table: &str,
        key: &str,
        logic: &Logic,
        condition: &Value,
        value: &Value,
    ) -> Result<(), StructureError> {
        let Some(sql) = self.sql else {
            return Err(StructureError::configuration(format!(
                "VERIFY {} in '{}' needs a probe query but no SQL creator is configured",
                key, table
            )));
        };
        SqlProber::new(sql, self.probe_table)
            .probe(table, key, logic, condition, value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureErrorKind;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn check(key: &str, condition: Value, real: Value) -> Result<(), StructureError> {
        let cache = PatternCache::new();
        let evaluator = ConditionEvaluator::new(&cache, None, "Test");
        evaluator.verify("Moment", key, &condition, &doc(real)).await
    }

    #[tokio::test]
    async fn test_regex_and() {
        let patterns = json!(["^A.*", "^.*Z$"]);
        assert!(check("name?", patterns.clone(), json!({"name": "AZ"})).await.is_ok());
        let err = check("name?", patterns, json!({"name": "BZ"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_membership_not() {
        assert!(check("!status{}", json!([1, 2]), json!({"status": 3})).await.is_ok());
        let err = check("!status{}", json!([1, 2]), json!({"status": 1})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::ValidationFailed);
        assert_eq!(err.field.as_deref(), Some("status"));
    }

    #[tokio::test]
    async fn test_intersection() {
        assert!(check("|tags<>", json!(["a", "z"]), json!({"tags": ["a", "b"]})).await.is_ok());
        assert!(check("tags<>", json!(["a", "z"]), json!({"tags": ["a", "b"]})).await.is_err());
        let err = check("tags<>", json!(["a"]), json!({"tags": "a"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::UnsupportedShape);
        assert_eq!(err.field.as_deref(), Some("tags"));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_null_value_is_vacuous() {
        for (key, condition) in [
            ("name?", json!("^x$")),
            ("status{}", json!([1])),
            ("status{}", json!(">0")),
            ("tags<>", json!(["a"])),
            ("name$", json!("%a%")),
        ] {
            assert!(check(key, condition.clone(), json!({"name": null, "status": null, "tags": null})).await.is_ok());
            assert!(check(key, condition, json!({})).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_configuration_errors() {
        let err = check("name?", Value::Null, json!({"name": "a"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);

        let err = check("name", json!("a"), json!({"name": "a"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);

        let err = check("status{}", json!(1), json!({"status": 1})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_probe_without_sql_creator() {
        let err = check("name$", json!("%a%"), json!({"name": "abc"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);
        let err = check("age{}", json!(">=18"), json!({"age": 20})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);
    }
}
