//! Error types for the record and repository layer.

use steadydb_client::TypeError;
use steadydb_pool::PoolError;
use thiserror::Error;

/// Validation errors raised while filling or decoding record fields.
///
/// These are kept apart from [`OrmError`]'s SQL-side variants so callers
/// can tell bad input from a failing database.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FieldError {
    /// A required field had no value.
    #[error("field `{field}` is required")]
    Required {
        /// Field name.
        field: String,
    },

    /// A value did not fit the field's type.
    #[error("field `{field}` expects {expected}, got {actual}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Expected type.
        expected: &'static str,
        /// What was found instead.
        actual: String,
    },

    /// A JSON-mapped field held text that is not valid JSON.
    #[error("field `{field}` holds invalid JSON: {message}")]
    Json {
        /// Field name.
        field: String,
        /// Parser message.
        message: String,
    },

    /// A record was asked for a field index it does not have.
    #[error("no field at index {0}")]
    UnknownIndex(usize),
}

impl FieldError {
    pub(crate) fn mismatch(field: &str, expected: &'static str, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected,
            actual: actual.into(),
        }
    }

    pub(crate) fn from_type(field: &str, expected: &'static str, err: TypeError) -> Self {
        match err {
            TypeError::UnexpectedNull => Self::Required {
                field: field.to_string(),
            },
            TypeError::InvalidJson(message) => Self::Json {
                field: field.to_string(),
                message,
            },
            other => Self::mismatch(field, expected, other.to_string()),
        }
    }
}

/// Errors that can occur in the repository layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrmError {
    /// A field name is not defined on the entity.
    #[error("field `{field}` is not defined on `{entity}`")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Offending field name.
        field: String,
    },

    /// `update` was executed without any `set`.
    #[error("no update field added")]
    NoUpdateField,

    /// `update` was executed without a WHERE clause.
    #[error("update without a WHERE condition is not allowed")]
    UnsafeUpdate,

    /// Two join items use the same alias.
    #[error("duplicate join alias `{0}`")]
    DuplicateAlias(String),

    /// The number of join items does not match the record tuple.
    #[error("join expects {expected} items, got {actual}")]
    JoinArity {
        /// Records in the tuple.
        expected: usize,
        /// Join items supplied.
        actual: usize,
    },

    /// An insert produced no generated identity.
    #[error("insert into `{table}` returned no generated identity")]
    MissingIdentity {
        /// Target table.
        table: String,
    },

    /// Field validation or decoding failed.
    #[error(transparent)]
    Validation(#[from] FieldError),

    /// Pool error, including errors from the connection.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Error reading a result value.
    #[error(transparent)]
    Client(#[from] steadydb_client::Error),
}

impl OrmError {
    /// Check if this is a configuration error raised before any statement
    /// ran.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownField { .. }
                | Self::NoUpdateField
                | Self::UnsafeUpdate
                | Self::DuplicateAlias(_)
                | Self::JoinArity { .. }
        )
    }
}

impl From<TypeError> for OrmError {
    fn from(err: TypeError) -> Self {
        Self::Client(err.into())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, OrmError>;
