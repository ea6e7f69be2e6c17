//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur during type conversion.
#[derive(Debug, Error)]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: String,
    },

    /// Value is out of range for target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// Invalid date/time value.
    #[error("invalid date/time: {0}")]
    InvalidDateTime(String),

    /// Text could not be parsed as JSON, or a value could not be serialized.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl TypeError {
    /// Build a mismatch error from the value that failed to convert.
    pub(crate) fn mismatch(expected: &'static str, actual: &crate::SqlValue) -> Self {
        Self::TypeMismatch {
            expected,
            actual: actual.type_name().to_string(),
        }
    }
}
