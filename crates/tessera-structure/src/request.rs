//! Request and response entry points.
//!
//! Requests get pre-checks on top of the walk: no privileged role, declared
//! objects must be present, and write methods must address rows by integer
//! identifiers. Responses are walked as-is.

use crate::error::StructureError;
use crate::walker::{NoopVisitor, ParseVisitor, StructureWalker};
use async_trait::async_trait;
use serde_json::Value;
use tessera_core::document::{Document, KEY_ID, KEY_ROLE, KEY_USER_ID, is_table_key};
use tessera_core::method::RequestMethod;
use tessera_core::role::RequestRole;

/// Visitor recursing into request objects and lists through
/// [`StructureWalker::parse_request`].
#[derive(Debug, Clone, Copy)]
pub struct RequestVisitor {
    method: RequestMethod,
}

impl RequestVisitor {
    pub fn new(method: RequestMethod) -> Self {
        Self { method }
    }
}

#[async_trait]
impl ParseVisitor for RequestVisitor {
    async fn on_parse_object(
        &self,
        walker: &StructureWalker,
        path: &str,
        key: &str,
        target: Document,
        real: Option<Value>,
    ) -> Result<Option<Value>, StructureError> {
        let method = self.method.as_str();
        let child = match real {
            None | Some(Value::Null) => {
                return Err(StructureError::object_missing(method, path, key));
            }
            Some(Value::Object(child)) => child,
            Some(_) => return Err(StructureError::unexpected_type(path, key, "an Object")),
        };

        let child_path = format!("{}/{}", path, key);
        if is_table_key(key) {
            if self.method.is_create_method() {
                if child.contains_key(KEY_ID) {
                    return Err(StructureError::identifier_on_create(method, path, key, KEY_ID));
                }
            } else if !self.method.is_query_method() {
                let max = walker.config().max_batch_ids;
                verify_id(method, &child_path, &child, KEY_ID, true, max)?;
                verify_id(method, &child_path, &child, KEY_USER_ID, false, max)?;
            }
        }

        let walked = walker
            .parse_request(self.method, &child_path, Some(target), Some(child))
            .await?;
        Ok(walked.map(Value::Object))
    }

    async fn on_parse_array(
        &self,
        walker: &StructureWalker,
        path: &str,
        key: &str,
        target: Vec<Value>,
        real: Option<Value>,
    ) -> Result<Option<Value>, StructureError> {
        if let Some(Value::Array(items)) = &real {
            let item_path = format!("{}/{}", path, key);
            for item in items {
                if let Value::Object(item) = item {
                    check_role(&item_path, item)?;
                }
            }
        }
        walker.walk_array(path, key, target, real, self).await
    }
}

/// Reject a declared privileged role and unrecognised role names.
fn check_role(path: &str, document: &Document) -> Result<(), StructureError> {
    match RequestRole::from_document(document) {
        Ok(Some(role)) if role.is_privileged() => Err(StructureError::elevated_role(
            path,
            KEY_ROLE,
            role.as_str(),
        )),
        Ok(_) => Ok(()),
        Err(e) => Err(StructureError::invalid_role(path, KEY_ROLE, &e.to_string())),
    }
}

/// Check the single and batch forms of an identifier field.
///
/// `id_key` must be an integer when present; `<id_key>{}` must be a list of
/// at most `max_batch` integers. With `at_least_one`, one of them must be
/// present.
pub fn verify_id(
    method: &str,
    path: &str,
    real: &Document,
    id_key: &str,
    at_least_one: bool,
    max_batch: usize,
) -> Result<(), StructureError> {
    let id = match real.get(id_key) {
        None | Some(Value::Null) => None,
        Some(value) if value.is_i64() || value.is_u64() => Some(value),
        Some(_) => {
            return Err(StructureError::invalid_identifier(
                method,
                path,
                id_key,
                "value must be an integer",
            ));
        }
    };

    let batch_key = format!("{}{{}}", id_key);
    let batch = match real.get(&batch_key) {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            return Err(StructureError::invalid_identifier(
                method,
                path,
                &batch_key,
                "value must be a list of integers",
            ));
        }
    };

    let Some(batch) = batch else {
        if at_least_one && id.is_none() {
            return Err(StructureError::identifier_missing(method, path, id_key, &batch_key));
        }
        return Ok(());
    };

    if batch.len() > max_batch {
        return Err(StructureError::invalid_identifier(
            method,
            path,
            &batch_key,
            &format!("at most {} identifiers per request", max_batch),
        ));
    }
    if !batch.iter().all(|item| item.is_i64() || item.is_u64()) {
        return Err(StructureError::invalid_identifier(
            method,
            path,
            &batch_key,
            "every item must be an integer",
        ));
    }
    Ok(())
}

impl StructureWalker {
    /// Validate and transform a request document.
    ///
    /// Returns `Ok(None)` when either the policy or the request is missing.
    pub async fn parse_request(
        &self,
        method: RequestMethod,
        name: &str,
        target: Option<Document>,
        request: Option<Document>,
    ) -> Result<Option<Document>, StructureError> {
        let (Some(target), Some(request)) = (target, request) else {
            tracing::debug!(%method, table = name, "Nothing to parse");
            return Ok(None);
        };

        check_role(name, &request)?;

        self.walk(name, target, request, &RequestVisitor::new(method))
            .await
            .map(Some)
    }

    /// Validate and transform a response document.
    ///
    /// A missing policy returns the response unchanged. Without a visitor
    /// nested levels are kept as they are.
    pub async fn parse_response(
        &self,
        method: RequestMethod,
        name: &str,
        target: Option<Document>,
        response: Option<Document>,
        visitor: Option<&dyn ParseVisitor>,
    ) -> Result<Option<Document>, StructureError> {
        let Some(target) = target else {
            tracing::debug!(%method, table = name, "No policy for response");
            return Ok(response);
        };
        let Some(response) = response else {
            return Ok(None);
        };

        self.walk(name, target, response, visitor.unwrap_or(&NoopVisitor))
            .await
            .map(Some)
    }
}
