//! Structure error types.
//!
//! Every error aborts the whole walk. Errors carry the nesting path of the
//! document level being walked (e.g. `Moment/Comment`) and, where one is
//! involved, the offending field.

use std::fmt;

/// Error raised while walking a document.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct StructureError {
    /// The kind of error.
    pub kind: StructureErrorKind,
    /// Nesting path of the document level, if known.
    pub table: Option<String>,
    /// Offending field, if any.
    pub field: Option<String>,
    /// Human-readable error message.
    pub message: String,
}

impl StructureError {
    /// Create a new error.
    pub fn new(kind: StructureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            table: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// True for violations caused by the client payload. Configuration and
    /// probe transport failures are server-side.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.kind,
            StructureErrorKind::Configuration | StructureErrorKind::ProbeFailed
        )
    }

    // =========================================================================
    // SERVER-SIDE ERRORS
    // =========================================================================

    /// Malformed policy document.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(StructureErrorKind::Configuration, message)
    }

    /// Probe query could not be executed.
    pub fn probe_failed(table: &str, field: &str, source: &anyhow::Error) -> Self {
        Self::new(
            StructureErrorKind::ProbeFailed,
            format!("Probe query for '{}' in '{}' failed: {:#}", field, table, source),
        )
        .with_table(table)
        .with_field(field)
    }

    // =========================================================================
    // SHAPE ERRORS
    // =========================================================================

    /// A NECESSARY field is absent or null.
    pub fn necessary_missing(table: &str, field: &str, necessary: &[String]) -> Self {
        Self::new(
            StructureErrorKind::MissingField,
            format!(
                "'{}' must not be missing '{}' or any other field of [{}]",
                table,
                field,
                necessary.join(",")
            ),
        )
        .with_table(table)
        .with_field(field)
    }

    /// A nested object declared by the policy is absent.
    pub fn object_missing(method: &str, table: &str, key: &str) -> Self {
        Self::new(
            StructureErrorKind::MissingField,
            format!("{} request must pass {}:{{}} inside '{}'", method, key, table),
        )
        .with_table(table)
        .with_field(key)
    }

    /// A disallowed field is present.
    pub fn forbidden_field(table: &str, field: &str, disallowed: &[String]) -> Self {
        Self::new(
            StructureErrorKind::ForbiddenField,
            format!(
                "'{}' must not pass '{}' or any other field of [{}]",
                table,
                field,
                disallowed.join(",")
            ),
        )
        .with_table(table)
        .with_field(field)
    }

    /// A create payload carries an identifier.
    pub fn identifier_on_create(method: &str, table: &str, key: &str, id_key: &str) -> Self {
        Self::new(
            StructureErrorKind::ForbiddenField,
            format!("{} request must not pass '{}' in '{}/{}'", method, id_key, table, key),
        )
        .with_table(format!("{}/{}", table, key))
        .with_field(id_key)
    }

    /// An object value under a key the policy does not declare as an object.
    pub fn unsupported_shape(table: &str, field: &str) -> Self {
        Self::new(
            StructureErrorKind::UnsupportedShape,
            format!("'{}' must not pass {}:{{}}", table, field),
        )
        .with_table(table)
        .with_field(field)
    }

    /// A value has the wrong JSON type for its position.
    pub fn unexpected_type(table: &str, field: &str, expected: &str) -> Self {
        Self::new(
            StructureErrorKind::UnsupportedShape,
            format!("'{}' in '{}' must be {}", field, table, expected),
        )
        .with_table(table)
        .with_field(field)
    }

    // =========================================================================
    // IDENTIFIER AND ROLE ERRORS
    // =========================================================================

    /// Identifier or batch identifier is malformed.
    pub fn invalid_identifier(method: &str, table: &str, field: &str, reason: &str) -> Self {
        Self::new(
            StructureErrorKind::InvalidIdentifier,
            format!("{} request, '{}' in '{}': {}", method, field, table, reason),
        )
        .with_table(table)
        .with_field(field)
    }

    /// Neither the identifier nor the batch identifier is present.
    pub fn identifier_missing(method: &str, table: &str, id_key: &str, batch_key: &str) -> Self {
        Self::new(
            StructureErrorKind::MissingField,
            format!(
                "{} request must pass at least one of '{}' and '{}' in '{}'",
                method, id_key, batch_key, table
            ),
        )
        .with_table(table)
        .with_field(id_key)
    }

    /// The payload declares the privileged role.
    pub fn elevated_role(table: &str, role_key: &str, role: &str) -> Self {
        Self::new(
            StructureErrorKind::ElevatedRoleRejected,
            format!(
                "Write requests must not declare {}:{{ {}:{} }}",
                table, role_key, role
            ),
        )
        .with_table(table)
        .with_field(role_key)
    }

    /// The payload declares a role that does not exist.
    pub fn invalid_role(table: &str, role_key: &str, reason: &str) -> Self {
        Self::new(StructureErrorKind::InvalidRole, format!("'{}': {}", table, reason))
            .with_table(table)
            .with_field(role_key)
    }

    // =========================================================================
    // CONDITION ERRORS
    // =========================================================================

    /// A VERIFY condition does not hold.
    pub fn validation_failed(table: &str, field: &str, key: &str, condition: &str) -> Self {
        Self::new(
            StructureErrorKind::ValidationFailed,
            format!(
                "Value of '{}' in '{}' is invalid: must satisfy {}:{}",
                field, table, key, condition
            ),
        )
        .with_table(table)
        .with_field(field)
    }

    /// A UNIQUE field collides with a stored row.
    pub fn duplicate_value(table: &str, field: &str, value: &str) -> Self {
        Self::new(
            StructureErrorKind::DuplicateValue,
            format!("{}: {} already exists in '{}'", field, value, table),
        )
        .with_table(table)
        .with_field(field)
    }
}

/// Categories of structure errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureErrorKind {
    /// Malformed policy document (server-side schema bug).
    Configuration,
    /// A required field or object is missing.
    MissingField,
    /// A field the policy forbids is present.
    ForbiddenField,
    /// A value has a shape the policy does not allow.
    UnsupportedShape,
    /// Identifier has the wrong type or the batch exceeds the cap.
    InvalidIdentifier,
    /// A VERIFY condition did not hold.
    ValidationFailed,
    /// A UNIQUE check found a conflicting row.
    DuplicateValue,
    /// A write payload declared the privileged role.
    ElevatedRoleRejected,
    /// The declared role is not recognised.
    InvalidRole,
    /// A probe query failed in transport or execution.
    ProbeFailed,
}

impl fmt::Display for StructureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructureErrorKind::Configuration => "configuration",
            StructureErrorKind::MissingField => "missing_field",
            StructureErrorKind::ForbiddenField => "forbidden_field",
            StructureErrorKind::UnsupportedShape => "unsupported_shape",
            StructureErrorKind::InvalidIdentifier => "invalid_identifier",
            StructureErrorKind::ValidationFailed => "validation_failed",
            StructureErrorKind::DuplicateValue => "duplicate_value",
            StructureErrorKind::ElevatedRoleRejected => "elevated_role_rejected",
            StructureErrorKind::InvalidRole => "invalid_role",
            StructureErrorKind::ProbeFailed => "probe_failed",
        };
        f.write_str(name)
    }
}
