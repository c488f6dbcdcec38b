//! Request roles.
//!
//! The role system itself lives outside Tessera. The only thing consumed here
//! is the role a client declares with `@role`, read by
//! [`RequestRole::from_document`].

use crate::document::{Document, KEY_ROLE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role a request is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestRole {
    Unknown,
    Login,
    Contact,
    Circle,
    Owner,
    /// Privileged role. Never accepted from a write payload.
    Admin,
}

impl RequestRole {
    pub const ALL: [RequestRole; 6] = [
        RequestRole::Unknown,
        RequestRole::Login,
        RequestRole::Contact,
        RequestRole::Circle,
        RequestRole::Owner,
        RequestRole::Admin,
    ];

    pub fn is_privileged(self) -> bool {
        self == RequestRole::Admin
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestRole::Unknown => "UNKNOWN",
            RequestRole::Login => "LOGIN",
            RequestRole::Contact => "CONTACT",
            RequestRole::Circle => "CIRCLE",
            RequestRole::Owner => "OWNER",
            RequestRole::Admin => "ADMIN",
        }
    }

    /// Extract the declared role of a document.
    ///
    /// Absent, null or blank `@role` yields `Ok(None)`.
    pub fn from_document(document: &Document) -> Result<Option<Self>, UnknownRole> {
        match document.get(KEY_ROLE) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s.parse().map(Some),
            Some(other) => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for RequestRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not recognised.
#[derive(Debug, Clone, Error)]
#[error("unknown request role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for RequestRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestRole::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
