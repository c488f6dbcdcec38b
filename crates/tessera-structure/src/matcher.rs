//! In-memory condition matching.
//!
//! Regex, membership and intersection conditions are decided without
//! touching storage. Candidates combine with the key's combinator and stop
//! at the first decisive candidate:
//!
//! - AND fails on the first candidate that does not hold
//! - OR passes on the first candidate that holds
//! - NOT fails on the first candidate that holds

use crate::error::StructureError;
use crate::logic::Combinator;
use crate::pattern::PatternCache;
use serde_json::Value;
use tessera_core::document::value_to_text;

/// Combine per-candidate results with short-circuiting.
pub fn combine<T, F>(combinator: Combinator, candidates: &[T], mut test: F) -> Result<bool, StructureError>
where
    F: FnMut(&T) -> Result<bool, StructureError>,
{
    for candidate in candidates {
        let holds = test(candidate)?;
        match combinator {
            Combinator::And if !holds => return Ok(false),
            Combinator::Or if holds => return Ok(true),
            Combinator::Not if holds => return Ok(false),
            _ => {}
        }
    }
    Ok(combinator != Combinator::Or)
}

/// Coerce a condition value into its candidate list.
pub fn candidates(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Match `value` against one or more regex patterns.
pub fn matches_patterns(
    cache: &PatternCache,
    combinator: Combinator,
    patterns: &Value,
    value: &Value,
) -> Result<bool, StructureError> {
    let text = value_to_text(value);
    combine(combinator, &candidates(patterns), |pattern| {
        let Some(source) = pattern.as_str() else {
            return Err(StructureError::configuration(format!(
                "regex condition {} must be a String or [String]",
                patterns
            )));
        };
        let compiled = cache.get_or_compile(source).map_err(|e| {
            StructureError::configuration(format!("invalid regex condition '{}': {}", source, e))
        })?;
        Ok(compiled.is_match(&text))
    })
}

/// Membership of `value` in `allowed`, inverted by NOT.
pub fn matches_membership(combinator: Combinator, allowed: &[Value], value: &Value) -> bool {
    allowed.contains(value) != (combinator == Combinator::Not)
}

/// Intersection of the list `value` with the candidates of `wanted`.
pub fn matches_intersection(combinator: Combinator, wanted: &Value, value: &[Value]) -> bool {
    let wanted = candidates(wanted);
    // Infallible per-candidate test.
    combine(combinator, &wanted, |candidate| Ok(value.contains(candidate))).unwrap_or(false)
}
