use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while compiling a form schema.
///
/// Only `InvalidSchema` and `JsonParseError` abort a compile; the field-level
/// variants are caught at the compiler's per-field boundary and turned into
/// diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum CompileError {
    #[error("Failed to parse schema JSON: {0}")]
    JsonParseError(String),

    #[error("Schema payload is invalid: {0}")]
    InvalidSchema(String),

    #[error("Field '{key}' of type '{kind}' is malformed: {message}")]
    MalformedField {
        key: String,
        kind: String,
        message: String,
    },

    #[error("Field '{key}' has an unregistered or invalid type: '{kind}'")]
    UnknownFieldType { key: String, kind: String },
}

/// Errors that can occur while evaluating a rule expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Unrecognized operation '{0}'")]
    UnknownOperator(String),

    #[error("Operation '{operator}' expects {expected} arguments, but received {found}")]
    Arity {
        operator: String,
        expected: String,
        found: usize,
    },

    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },
}

/// Errors raised by the dynamic record facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Field '{key}' expects a value of type {expected}, but found '{found}'")]
    InvalidValue {
        key: String,
        expected: String,
        found: Value,
    },

    #[error("Record payload must be a JSON object, found '{0}'")]
    NotAnObject(Value),
}
