//! Client error types.

use std::fmt;

use thiserror::Error;

use crate::config::FailureSet;

/// Classification tag attached to every error a driver reports.
///
/// Drivers map their native errors onto these tags; the steady
/// connection decides whether to reconnect by matching tags against the
/// configured [`FailureSet`], never by inspecting error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection-level trouble: lost link, server gone away, timeouts.
    Operational,
    /// Failure in the driver interface itself.
    Interface,
    /// The server reported an internal inconsistency.
    Internal,
    /// Bad SQL or wrong parameter count.
    Programming,
    /// Constraint violation.
    Integrity,
    /// Value out of range or otherwise unusable by the server.
    Data,
    /// The driver does not support the requested operation.
    NotSupported,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        Self::Operational,
        Self::Interface,
        Self::Internal,
        Self::Programming,
        Self::Integrity,
        Self::Data,
        Self::NotSupported,
    ];

    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Operational => "operational",
            Self::Interface => "interface",
            Self::Internal => "internal",
            Self::Programming => "programming",
            Self::Integrity => "integrity",
            Self::Data => "data",
            Self::NotSupported => "not supported",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver reported an error.
    #[error("{kind} error: {message}")]
    Driver {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Driver message.
        message: String,
    },

    /// The connection has been closed and cannot be used.
    #[error("connection closed")]
    Closed,

    /// Type conversion error.
    #[error("type error: {0}")]
    Type(#[from] steadydb_types::TypeError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A fetch was attempted without a preceding statement that returned rows.
    #[error("no result set available")]
    NoResultSet,
}

impl Error {
    /// Build a driver error with the given tag.
    pub fn driver(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Driver {
            kind,
            message: message.into(),
        }
    }

    /// Classification tag of this error.
    ///
    /// A closed connection is reported as [`ErrorKind::Interface`], which
    /// lets a steady connection recover from a raw handle that vanished.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Driver { kind, .. } => *kind,
            Self::Closed => ErrorKind::Interface,
            Self::Type(_) | Self::NoResultSet => ErrorKind::Data,
            Self::Config(_) => ErrorKind::Programming,
        }
    }

    /// Check whether this error belongs to the given failure set and
    /// should trigger a reconnect.
    #[must_use]
    pub fn is_failure(&self, failures: &FailureSet) -> bool {
        match self {
            Self::Driver { kind, .. } => failures.contains(*kind),
            Self::Closed => failures.contains(ErrorKind::Interface),
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_failure_matches_tags() {
        let failures = FailureSet::default();
        assert!(Error::driver(ErrorKind::Operational, "gone").is_failure(&failures));
        assert!(!Error::driver(ErrorKind::Integrity, "dup").is_failure(&failures));
        assert!(Error::Closed.is_failure(&failures));
        assert!(!Error::NoResultSet.is_failure(&failures));
    }

    #[test]
    fn test_display() {
        let err = Error::driver(ErrorKind::Programming, "syntax error near FROM");
        assert_eq!(err.to_string(), "programming error: syntax error near FROM");
    }
}
