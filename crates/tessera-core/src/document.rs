//! Document model.
//!
//! Requests, responses and policy documents are all ordered JSON objects.
//! Ordering matters: policy entries and directives are applied in insertion
//! order.

use serde_json::{Map, Value};

/// An ordered JSON object.
pub type Document = Map<String, Value>;

/// Identifier field of a table object.
pub const KEY_ID: &str = "id";

/// Owner identifier field of a table object.
pub const KEY_USER_ID: &str = "userId";

/// Role declared by the client inside a request.
pub const KEY_ROLE: &str = "@role";

/// Row count returned by probe queries.
pub const KEY_COUNT: &str = "count";

/// Returns true if `key` names a table (a capitalized identifier such as `Moment`).
pub fn is_table_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Returns true if `key` is a plain field identifier.
///
/// Accepts ASCII alphanumerics and `_`, with an optional leading `@`.
pub fn is_field_name(key: &str) -> bool {
    let name = key.strip_prefix('@').unwrap_or(key);
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a comma-delimited field list, dropping blanks.
pub fn split_fields(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render a scalar the way it is compared as text: strings unquoted,
/// everything else as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
