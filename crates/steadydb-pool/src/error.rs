//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The driver cannot be used from more than one task.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Maximum connections reached and the pool does not block.
    #[error("too many connections (max {max})")]
    TooManyConnections {
        /// Maximum allowed connections.
        max: usize,
    },

    /// The handle was already returned to the pool.
    #[error("invalid connection: handle already released")]
    InvalidConnection,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Error from the underlying connection.
    #[error(transparent)]
    Connection(#[from] steadydb_client::Error),
}

impl PoolError {
    /// Check if this is a capacity error.
    #[must_use]
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::TooManyConnections { .. })
    }
}
