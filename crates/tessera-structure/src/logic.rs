//! Condition keys.
//!
//! A VERIFY key encodes a condition in its first and last characters:
//!
//! ```text
//!   [&|!]field<suffix>
//! ```
//!
//! | Prefix | Combinator |
//! |--------|------------|
//! | none   | AND        |
//! | `&`    | AND        |
//! | `\|`   | OR         |
//! | `!`    | NOT        |
//!
//! | Suffix | Kind |
//! |--------|------|
//! | `$`    | search, resolved by a probe query (LIKE) |
//! | `?`    | regular expression |
//! | `{}`   | range expression (probe) or membership list |
//! | `<>`   | intersection with a list value |

use crate::error::StructureError;
use std::fmt;
use tessera_core::document::is_field_name;

/// How several candidates of one condition combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Every candidate must hold.
    And,
    /// At least one candidate must hold.
    Or,
    /// No candidate may hold.
    Not,
}

impl Combinator {
    fn from_prefix(c: char) -> Option<Self> {
        match c {
            '&' => Some(Combinator::And),
            '|' => Some(Combinator::Or),
            '!' => Some(Combinator::Not),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Combinator::And => '&',
            Combinator::Or => '|',
            Combinator::Not => '!',
        }
    }
}

/// Condition kind selected by the key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Search,
    Regex,
    Range,
    Intersect,
}

impl ConditionKind {
    // Two-character suffixes first.
    const ALL: [ConditionKind; 4] = [
        ConditionKind::Range,
        ConditionKind::Intersect,
        ConditionKind::Search,
        ConditionKind::Regex,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ConditionKind::Search => "$",
            ConditionKind::Regex => "?",
            ConditionKind::Range => "{}",
            ConditionKind::Intersect => "<>",
        }
    }
}

/// A parsed condition key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logic {
    field: String,
    combinator: Combinator,
    kind: ConditionKind,
}

impl Logic {
    /// Parse a VERIFY key such as `!status{}` or `name?`.
    pub fn parse(key: &str) -> Result<Self, StructureError> {
        let (kind, rest) = ConditionKind::ALL
            .into_iter()
            .find_map(|kind| key.strip_suffix(kind.suffix()).map(|rest| (kind, rest)))
            .ok_or_else(|| {
                StructureError::configuration(format!(
                    "VERIFY key '{}' has no condition suffix ($, ?, {{}}, <>)",
                    key
                ))
            })?;

        let mut chars = rest.chars();
        let (combinator, field) = match chars.next().and_then(Combinator::from_prefix) {
            Some(combinator) => (combinator, chars.as_str()),
            None => (Combinator::And, rest),
        };

        if !is_field_name(field) {
            return Err(StructureError::configuration(format!(
                "VERIFY key '{}' does not name a valid field",
                key
            )));
        }

        Ok(Self {
            field: field.to_string(),
            combinator,
            kind,
        })
    }

    /// The data field the condition reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn kind(&self) -> ConditionKind {
        self.kind
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.combinator.as_char(),
            self.field,
            self.kind.suffix()
        )
    }
}
