//! Schema and view error types
//!
//! Error codes:
//! - VIEW_AMBIGUOUS_ACCESS_MODE
//! - VIEW_INVALID_SCHEMA
//! - VIEW_SCHEMA_IMMUTABLE
//! - VIEW_UNKNOWN_SCHEMA
//! - VIEW_CONFLICT
//! - VIEW_NAME_COLLISION
//! - VIEW_MISSING
//! - VIEW_SOURCE_MISMATCH
//! - VIEW_VALIDATION_FAILED
//! - VIEW_MALFORMED_DEFINITION

use std::fmt;

use thiserror::Error;

/// Stable error codes, one per [`SchemaError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// More than one access mode on a single field
    AmbiguousAccessMode,
    /// Schema definition is structurally invalid
    InvalidSchema,
    /// Attempt to redefine an existing schema
    SchemaImmutable,
    /// Schema name not found in the catalog
    UnknownSchema,
    /// View name already taken by a view of a different shape
    ViewConflict,
    /// Synthesized view name clashes with an existing schema
    NameCollision,
    /// Nested schema has no view and the policy forbids building one
    MissingView,
    /// Projection between unrelated schemas
    SourceMismatch,
    /// Instance violates its schema
    ValidationFailed,
    /// Definition file could not be read or parsed
    MalformedDefinition,
}

impl SchemaErrorCode {
    /// Returns the string code.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::AmbiguousAccessMode => "VIEW_AMBIGUOUS_ACCESS_MODE",
            SchemaErrorCode::InvalidSchema => "VIEW_INVALID_SCHEMA",
            SchemaErrorCode::SchemaImmutable => "VIEW_SCHEMA_IMMUTABLE",
            SchemaErrorCode::UnknownSchema => "VIEW_UNKNOWN_SCHEMA",
            SchemaErrorCode::ViewConflict => "VIEW_CONFLICT",
            SchemaErrorCode::NameCollision => "VIEW_NAME_COLLISION",
            SchemaErrorCode::MissingView => "VIEW_MISSING",
            SchemaErrorCode::SourceMismatch => "VIEW_SOURCE_MISMATCH",
            SchemaErrorCode::ValidationFailed => "VIEW_VALIDATION_FAILED",
            SchemaErrorCode::MalformedDefinition => "VIEW_MALFORMED_DEFINITION",
        }
    }

    /// Definition-time errors are raised while a schema is being declared,
    /// before any view is built.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            SchemaErrorCode::AmbiguousAccessMode
                | SchemaErrorCode::InvalidSchema
                | SchemaErrorCode::SchemaImmutable
                | SchemaErrorCode::MalformedDefinition
        )
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Validation failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field path (e.g., "address.city", "tags[2]")
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "field to be present".into(),
            actual: "missing".into(),
        }
    }

    pub fn extra_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "no undeclared fields".into(),
            actual: "extra field present".into(),
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn computed_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "no value for a computed field".into(),
            actual: "value provided".into(),
        }
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': expected {}, got {}", self.field, self.expected, self.actual)
    }
}

/// Errors raised while defining schemas, building views and projecting records.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("field '{field}' of schema '{schema}' declares more than one access mode")]
    AmbiguousAccessMode { schema: String, field: String },

    #[error("invalid schema '{schema}': {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("schema '{0}' is already defined and cannot be replaced")]
    SchemaImmutable(String),

    #[error("schema '{0}' not found")]
    UnknownSchema(String),

    #[error("view '{view}' of schema '{schema}' is already registered with a different shape")]
    ViewConflict { schema: String, view: String },

    #[error("view name '{0}' collides with an existing schema")]
    NameCollision(String),

    #[error("schema '{schema}' has no view '{view}'")]
    MissingView { schema: String, view: String },

    #[error("record of schema '{actual}' cannot be projected onto schema '{expected}'")]
    SourceMismatch { expected: String, actual: String },

    #[error("validation of '{schema}' failed: {details}")]
    ValidationFailed { schema: String, details: ValidationDetails },

    #[error("malformed definition '{path}': {reason}")]
    MalformedDefinition { path: String, reason: String },
}

impl SchemaError {
    pub fn invalid_schema(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    pub fn validation_failed(schema: impl Into<String>, details: ValidationDetails) -> Self {
        SchemaError::ValidationFailed {
            schema: schema.into(),
            details,
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::MalformedDefinition {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        match self {
            SchemaError::AmbiguousAccessMode { .. } => SchemaErrorCode::AmbiguousAccessMode,
            SchemaError::InvalidSchema { .. } => SchemaErrorCode::InvalidSchema,
            SchemaError::SchemaImmutable(_) => SchemaErrorCode::SchemaImmutable,
            SchemaError::UnknownSchema(_) => SchemaErrorCode::UnknownSchema,
            SchemaError::ViewConflict { .. } => SchemaErrorCode::ViewConflict,
            SchemaError::NameCollision(_) => SchemaErrorCode::NameCollision,
            SchemaError::MissingView { .. } => SchemaErrorCode::MissingView,
            SchemaError::SourceMismatch { .. } => SchemaErrorCode::SourceMismatch,
            SchemaError::ValidationFailed { .. } => SchemaErrorCode::ValidationFailed,
            SchemaError::MalformedDefinition { .. } => SchemaErrorCode::MalformedDefinition,
        }
    }

    /// Returns validation details if applicable
    pub fn details(&self) -> Option<&ValidationDetails> {
        match self {
            SchemaError::ValidationFailed { details, .. } => Some(details),
            _ => None,
        }
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(SchemaErrorCode::AmbiguousAccessMode.code(), "VIEW_AMBIGUOUS_ACCESS_MODE");
        assert_eq!(SchemaErrorCode::ViewConflict.code(), "VIEW_CONFLICT");
        assert_eq!(SchemaErrorCode::ValidationFailed.code(), "VIEW_VALIDATION_FAILED");
        assert_eq!(SchemaErrorCode::UnknownSchema.code(), "VIEW_UNKNOWN_SCHEMA");
    }

    #[test]
    fn test_definition_errors() {
        assert!(SchemaErrorCode::AmbiguousAccessMode.is_definition_error());
        assert!(SchemaErrorCode::SchemaImmutable.is_definition_error());
        assert!(!SchemaErrorCode::ViewConflict.is_definition_error());
        assert!(!SchemaErrorCode::ValidationFailed.is_definition_error());
    }

    #[test]
    fn test_validation_details_display() {
        let details = ValidationDetails::type_mismatch("age", "int", "string");
        let display = format!("{}", details);
        assert!(display.contains("age"));
        assert!(display.contains("int"));
        assert!(display.contains("string"));
    }

    #[test]
    fn test_error_code_matches_variant() {
        let details = ValidationDetails::missing_field("email");
        let err = SchemaError::validation_failed("Model", details);
        assert_eq!(err.code(), SchemaErrorCode::ValidationFailed);
        assert_eq!(err.details().map(|d| d.field.as_str()), Some("email"));
        assert!(err.to_string().contains("Model"));
    }
}
