//! The structure walker.
//!
//! One [`StructureWalker::walk`] call handles one nesting level: it strips the
//! governance directives from the policy, walks the remaining policy keys
//! through a [`ParseVisitor`], enforces the shape rules and finally applies
//! the operations. Recursion into nested objects and lists is left to the
//! visitor so that request and response handling can differ.

use crate::error::StructureError;
use crate::operation::{self, Operation};
use crate::pattern::PatternCache;
use crate::probe::SqlCreator;
use crate::unique::{self, UniqueChecker};
use crate::verify::ConditionEvaluator;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tessera_core::config::StructureConfig;
use tessera_core::document::{Document, split_fields};

/// Marker value of `DISALLOW` meaning "every undeclared field".
pub const DISALLOW_UNDECLARED: &str = "!";

/// Fields rejected by `DISALLOW`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Disallow {
    #[default]
    None,
    Fields(Vec<String>),
    /// Every data field that is not `@`-prefixed, not NECESSARY and not a
    /// nested object declared by the policy.
    AllUndeclared,
}

/// Governance directives of one policy level.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    pub verify: Option<Document>,
    pub add: Option<Document>,
    pub put: Option<Document>,
    pub replace: Option<Document>,
    pub unique: Vec<String>,
    pub remove: Vec<String>,
    pub necessary: Vec<String>,
    pub disallow: Disallow,
}

impl Directives {
    /// Remove every governance key from `target` and parse it.
    pub fn extract(target: &mut Document, table: &str) -> Result<Self, StructureError> {
        let mut directives = Directives::default();

        for op in Operation::ALL {
            let Some(value) = target.shift_remove(op.key()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            if op.takes_mapping() {
                let mapping = match value {
                    Value::Object(mapping) => mapping,
                    other => {
                        return Err(StructureError::configuration(format!(
                            "{} in '{}' must be an Object, got {}",
                            op, table, other
                        )));
                    }
                };
                match op {
                    Operation::Verify => directives.verify = Some(mapping),
                    Operation::Add => directives.add = Some(mapping),
                    Operation::Put => directives.put = Some(mapping),
                    _ => directives.replace = Some(mapping),
                }
                continue;
            }

            if op == Operation::Disallow && value.as_str() == Some(DISALLOW_UNDECLARED) {
                directives.disallow = Disallow::AllUndeclared;
                continue;
            }

            let fields = field_list(op, table, &value)?;
            match op {
                Operation::Unique => directives.unique = fields,
                Operation::Remove => directives.remove = fields,
                Operation::Necessary => directives.necessary = fields,
                _ => directives.disallow = Disallow::Fields(fields),
            }
        }

        Ok(directives)
    }
}

fn field_list(op: Operation, table: &str, value: &Value) -> Result<Vec<String>, StructureError> {
    let invalid = || {
        StructureError::configuration(format!(
            "{} in '{}' must be a String or [String], got {}",
            op, table, value
        ))
    };

    match value {
        Value::String(list) => Ok(split_fields(list)),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .filter(|item| item.as_ref().is_none_or(|s| !s.is_empty()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Hooks called for each remaining policy key of a level.
///
/// Every hook receives the policy value by value (the walk consumes its
/// policy) and the current data value, and returns the value to store back.
/// A `None` or null result leaves the data untouched. The defaults return the
/// data value unchanged without recursing.
#[async_trait]
pub trait ParseVisitor: Send + Sync {
    /// Return false to skip `key` entirely.
    fn on_parse(&self, _key: &str, _target: &Value, _real: Option<&Value>) -> bool {
        true
    }

    async fn on_parse_object(
        &self,
        _walker: &StructureWalker,
        _path: &str,
        _key: &str,
        _target: Document,
        real: Option<Value>,
    ) -> Result<Option<Value>, StructureError> {
        Ok(real)
    }

    async fn on_parse_array(
        &self,
        _walker: &StructureWalker,
        _path: &str,
        _key: &str,
        _target: Vec<Value>,
        real: Option<Value>,
    ) -> Result<Option<Value>, StructureError> {
        Ok(real)
    }

    async fn on_parse_scalar(
        &self,
        _path: &str,
        _key: &str,
        _target: Value,
        real: Option<Value>,
    ) -> Result<Option<Value>, StructureError> {
        Ok(real)
    }
}

/// Visitor that keeps every hook at its identity default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVisitor;

impl ParseVisitor for NoopVisitor {}

/// Walks data documents against policy documents.
#[derive(Clone)]
pub struct StructureWalker {
    config: StructureConfig,
    patterns: Arc<PatternCache>,
    sql: Option<Arc<dyn SqlCreator>>,
    unique: Option<Arc<dyn UniqueChecker>>,
}

impl std::fmt::Debug for StructureWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureWalker")
            .field("config", &self.config)
            .field("patterns", &self.patterns.len())
            .field("sql", &self.sql.is_some())
            .field("unique", &self.unique.is_some())
            .finish()
    }
}

impl StructureWalker {
    /// Create a walker using the process-wide pattern cache and no
    /// collaborators.
    pub fn new(config: StructureConfig) -> Self {
        Self {
            config,
            patterns: PatternCache::shared(),
            sql: None,
            unique: None,
        }
    }

    pub fn with_patterns(mut self, patterns: Arc<PatternCache>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_sql_creator(mut self, creator: Arc<dyn SqlCreator>) -> Self {
        self.sql = Some(creator);
        self
    }

    pub fn with_unique_checker(mut self, checker: Arc<dyn UniqueChecker>) -> Self {
        self.unique = Some(checker);
        self
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    /// Walk one level of `real` against `target` and return the mutated data.
    ///
    /// `path` names the level (e.g. `Moment/Comment`); its last segment is
    /// the table handed to the uniqueness checker.
    pub async fn walk(
        &self,
        path: &str,
        mut target: Document,
        mut real: Document,
        visitor: &dyn ParseVisitor,
    ) -> Result<Document, StructureError> {
        let directives = Directives::extract(&mut target, path)?;
        tracing::debug!(
            path,
            keys = target.len(),
            fields = real.len(),
            "Walking structure level"
        );

        for field in &directives.remove {
            real.shift_remove(field);
        }

        for field in &directives.necessary {
            if real.get(field).is_none_or(Value::is_null) {
                return Err(StructureError::necessary_missing(
                    path,
                    field,
                    &directives.necessary,
                ));
            }
        }

        let mut object_keys: Vec<String> = Vec::new();
        for (key, tv) in target {
            let rv = real.get(&key).cloned();
            if !visitor.on_parse(&key, &tv, rv.as_ref()) {
                continue;
            }

            let result = match tv {
                Value::Object(child) => {
                    object_keys.push(key.clone());
                    visitor.on_parse_object(self, path, &key, child, rv).await?
                }
                Value::Array(items) => visitor.on_parse_array(self, path, &key, items, rv).await?,
                other => visitor.on_parse_scalar(path, &key, other, rv).await?,
            };

            if let Some(value) = result.filter(|v| !v.is_null()) {
                real.insert(key, value);
            }
        }

        let disallowed: Vec<String> = match directives.disallow {
            Disallow::None => Vec::new(),
            Disallow::Fields(fields) => fields,
            Disallow::AllUndeclared => real
                .keys()
                .filter(|k| {
                    !k.starts_with('@')
                        && !directives.necessary.contains(k)
                        && !object_keys.contains(k)
                })
                .cloned()
                .collect(),
        };

        for (key, value) in &real {
            if disallowed.contains(key) {
                return Err(StructureError::forbidden_field(path, key, &disallowed));
            }
            if value.is_object() && !key.starts_with('@') && !object_keys.contains(key) {
                return Err(StructureError::unsupported_shape(path, key));
            }
        }
        real.retain(|_, value| !value.is_null());

        let evaluator =
            ConditionEvaluator::new(&self.patterns, self.sql.as_deref(), &self.config.probe_table);
        operation::apply(Operation::Verify, path, directives.verify.as_ref(), &mut real, &evaluator)
            .await?;
        operation::apply(Operation::Add, path, directives.add.as_ref(), &mut real, &evaluator)
            .await?;
        operation::apply(Operation::Put, path, directives.put.as_ref(), &mut real, &evaluator)
            .await?;
        operation::apply(
            Operation::Replace,
            path,
            directives.replace.as_ref(),
            &mut real,
            &evaluator,
        )
        .await?;

        unique::verify_unique(self.unique.as_deref(), table_name(path), &directives.unique, &real)
            .await?;

        Ok(real)
    }

    /// Walk every element of a list against the first element of `target`.
    ///
    /// Absent or null data and a policy list without an object head are left
    /// untouched. Otherwise the data must be a list of objects.
    pub async fn walk_array(
        &self,
        path: &str,
        key: &str,
        target: Vec<Value>,
        real: Option<Value>,
        visitor: &dyn ParseVisitor,
    ) -> Result<Option<Value>, StructureError> {
        let Some(Value::Object(item_policy)) = target.into_iter().next() else {
            return Ok(real);
        };
        let items = match real {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(StructureError::unexpected_type(path, key, "an Array of Objects"));
            }
        };

        let item_path = format!("{}/{}", path, key);
        let mut walked = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(item) = item else {
                return Err(StructureError::unexpected_type(path, key, "an Array of Objects"));
            };
            let item = self.walk(&item_path, item_policy.clone(), item, visitor).await?;
            walked.push(Value::Object(item));
        }
        Ok(Some(Value::Array(walked)))
    }
}

/// Last segment of a nesting path.
pub(crate) fn table_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn walker() -> StructureWalker {
        StructureWalker::new(StructureConfig::default()).with_patterns(Arc::new(PatternCache::new()))
    }

    async fn walk(target: Value, real: Value) -> Result<Value, StructureError> {
        walker()
            .walk("Moment", doc(target), doc(real), &NoopVisitor)
            .await
            .map(Value::Object)
    }

    #[test]
    fn test_extract_directives() {
        let mut target = doc(json!({
            "VERIFY": {"name?": "^a$"},
            "NECESSARY": "content, userId",
            "DISALLOW": ["id"],
            "UNIQUE": null,
            "content": "",
        }));
        let directives = Directives::extract(&mut target, "Moment").unwrap();
        assert_eq!(Value::Object(target), json!({"content": ""}));
        assert_eq!(directives.necessary, vec!["content", "userId"]);
        assert_eq!(directives.disallow, Disallow::Fields(vec!["id".to_string()]));
        assert!(directives.unique.is_empty());
        assert!(directives.verify.is_some());
    }

    #[test]
    fn test_extract_rejects_malformed_directives() {
        for target in [
            json!({"ADD": "a"}),
            json!({"NECESSARY": 1}),
            json!({"REMOVE": ["a", 2]}),
        ] {
            let err = Directives::extract(&mut doc(target), "Moment").unwrap_err();
            assert_eq!(err.kind, StructureErrorKind::Configuration);
        }
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("Moment"), "Moment");
        assert_eq!(table_name("Moment/Comment"), "Comment");
    }

    #[tokio::test]
    async fn test_governance_keys_stripped() {
        let real = walk(
            json!({"ADD": {"a": 1}, "NECESSARY": "b", "content": ""}),
            json!({"b": 2}),
        )
        .await
        .unwrap();
        assert_eq!(real, json!({"b": 2, "a": 1}));
    }

    #[tokio::test]
    async fn test_remove_before_necessary() {
        let err = walk(json!({"REMOVE": "a", "NECESSARY": "a"}), json!({"a": 1}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::MissingField);
        assert_eq!(err.field.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_necessary_rejects_null() {
        let err = walk(json!({"NECESSARY": "a"}), json!({"a": null})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::MissingField);
    }

    #[tokio::test]
    async fn test_operation_order() {
        let real = walk(json!({"ADD": {"a": 1}, "REPLACE": {"a": 2}}), json!({}))
            .await
            .unwrap();
        assert_eq!(real, json!({"a": 2}));
    }

    #[tokio::test]
    async fn test_disallow_undeclared() {
        let err = walk(
            json!({"DISALLOW": "!", "NECESSARY": "a"}),
            json!({"a": 1, "b": 2, "@role": "OWNER"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::ForbiddenField);
        assert_eq!(err.field.as_deref(), Some("b"));

        let real = walk(
            json!({"DISALLOW": "!", "NECESSARY": "a"}),
            json!({"a": 1, "@role": "OWNER"}),
        )
        .await
        .unwrap();
        assert_eq!(real, json!({"a": 1, "@role": "OWNER"}));
    }

    #[tokio::test]
    async fn test_disallow_checked_before_shape() {
        let err = walk(json!({"DISALLOW": "b"}), json!({"b": {"x": 1}})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::ForbiddenField);
    }

    #[tokio::test]
    async fn test_undeclared_object_rejected() {
        let err = walk(json!({}), json!({"Comment": {"id": 1}})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::UnsupportedShape);

        let real = walk(json!({}), json!({"@meta": {"x": 1}})).await.unwrap();
        assert_eq!(real, json!({"@meta": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_declared_object_kept_by_noop_visitor() {
        let real = walk(json!({"Comment": {"DISALLOW": "!"}}), json!({"Comment": {"x": 1}}))
            .await
            .unwrap();
        assert_eq!(real, json!({"Comment": {"x": 1}}));
    }

    #[tokio::test]
    async fn test_disallow_undeclared_exempts_declared_objects() {
        let real = walk(
            json!({"DISALLOW": "!", "Comment": {}}),
            json!({"Comment": {"content": "hi"}}),
        )
        .await
        .unwrap();
        assert_eq!(real, json!({"Comment": {"content": "hi"}}));

        let err = walk(
            json!({"DISALLOW": "!", "Comment": {}}),
            json!({"Comment": {"content": "hi"}, "extra": 1}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::ForbiddenField);
        assert_eq!(err.field.as_deref(), Some("extra"));
    }

    /// Skips `skipped` and fills absent scalars from the policy value.
    struct ComputedVisitor;

    #[async_trait]
    impl ParseVisitor for ComputedVisitor {
        fn on_parse(&self, key: &str, _target: &Value, _real: Option<&Value>) -> bool {
            key != "skipped"
        }

        async fn on_parse_scalar(
            &self,
            _path: &str,
            _key: &str,
            target: Value,
            real: Option<Value>,
        ) -> Result<Option<Value>, StructureError> {
            Ok(real.or(Some(target)))
        }
    }

    #[tokio::test]
    async fn test_visitor_skip_and_inject() {
        let real = walker()
            .walk(
                "Moment",
                doc(json!({"skipped": 1, "kept": 0, "injected": 7})),
                doc(json!({"kept": 2})),
                &ComputedVisitor,
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(real), json!({"kept": 2, "injected": 7}));
    }

    #[tokio::test]
    async fn test_null_policy_value_injects_nothing() {
        let real = walker()
            .walk(
                "Moment",
                doc(json!({"kept": null})),
                doc(json!({"kept": 2})),
                &ComputedVisitor,
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(real), json!({"kept": 2}));

        let real = walker()
            .walk("Moment", doc(json!({"absent": null})), doc(json!({})), &ComputedVisitor)
            .await
            .unwrap();
        assert_eq!(Value::Object(real), json!({}));
    }

    #[tokio::test]
    async fn test_null_fields_dropped() {
        let real = walk(json!({}), json!({"a": 1, "b": null, "c": 3})).await.unwrap();
        assert_eq!(real, json!({"a": 1, "c": 3}));
    }

    #[tokio::test]
    async fn test_unique_without_checker() {
        let err = walk(json!({"UNIQUE": "name"}), json!({"name": "a"})).await.unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::Configuration);
    }

    struct ArrayVisitor;

    #[async_trait]
    impl ParseVisitor for ArrayVisitor {
        async fn on_parse_array(
            &self,
            walker: &StructureWalker,
            path: &str,
            key: &str,
            target: Vec<Value>,
            real: Option<Value>,
        ) -> Result<Option<Value>, StructureError> {
            walker.walk_array(path, key, target, real, self).await
        }
    }

    #[tokio::test]
    async fn test_walk_array_uses_fresh_item_policy() {
        let real = walker()
            .walk(
                "Moment",
                doc(json!({"praise": [{"ADD": {"n": 0}, "REMOVE": "secret"}]})),
                doc(json!({"praise": [{"secret": 1}, {"n": 5}]})),
                &ArrayVisitor,
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(real), json!({"praise": [{"n": 0}, {"n": 5}]}));
    }

    #[tokio::test]
    async fn test_walk_array_shapes() {
        let err = walker()
            .walk(
                "Moment",
                doc(json!({"praise": [{}]})),
                doc(json!({"praise": [1, 2]})),
                &ArrayVisitor,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, StructureErrorKind::UnsupportedShape);

        let real = walker()
            .walk(
                "Moment",
                doc(json!({"tags": ["a"]})),
                doc(json!({"tags": [1, 2]})),
                &ArrayVisitor,
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(real), json!({"tags": [1, 2]}));
    }
}
