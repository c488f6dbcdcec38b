//! Request methods.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The method a request was issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    /// Read a single object.
    Get,
    /// Count matching objects.
    Head,
    /// Read with a privileged (audited) channel.
    Gets,
    /// Count with a privileged channel.
    Heads,
    /// Create.
    Post,
    /// Update.
    Put,
    /// Delete.
    Delete,
}

impl RequestMethod {
    /// All methods, in declaration order.
    pub const ALL: [RequestMethod; 7] = [
        RequestMethod::Get,
        RequestMethod::Head,
        RequestMethod::Gets,
        RequestMethod::Heads,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Delete,
    ];

    /// Read-only methods never mutate storage.
    pub fn is_query_method(self) -> bool {
        matches!(
            self,
            RequestMethod::Get | RequestMethod::Head | RequestMethod::Gets | RequestMethod::Heads
        )
    }

    /// Create-style method: the payload must not carry identifiers.
    pub fn is_create_method(self) -> bool {
        self == RequestMethod::Post
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Head => "HEAD",
            RequestMethod::Gets => "GETS",
            RequestMethod::Heads => "HEADS",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not recognised.
#[derive(Debug, Clone, Error)]
#[error("unknown request method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for RequestMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}
