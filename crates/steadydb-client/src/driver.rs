//! Contracts a database driver implements to be pooled.
//!
//! A driver supplies a [`Creator`] that opens [`RawConnection`]s. Both
//! traits are object safe, so pools hold `Arc<dyn Creator>` and
//! `Box<dyn RawConnection>` and never see the concrete driver types.

use async_trait::async_trait;
use steadydb_types::SqlValue;

use crate::error::Result;
use crate::row::QueryResult;

/// How far a driver may be used concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ThreadSafety {
    /// The driver may not be used from more than one task at all.
    Unsafe,
    /// Tasks may share the driver but not connections.
    Module,
    /// Tasks may share individual connections.
    Connection,
}

impl ThreadSafety {
    /// Map a numeric level (`0`, `1`, `2+`) onto a variant.
    #[must_use]
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Unsafe,
            1 => Self::Module,
            _ => Self::Connection,
        }
    }

    /// Numeric level of this variant.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Unsafe => 0,
            Self::Module => 1,
            Self::Connection => 2,
        }
    }

    /// Whether connections may be shared between owners.
    #[must_use]
    pub fn allows_sharing(self) -> bool {
        self == Self::Connection
    }
}

/// One raw connection opened by a driver.
///
/// Every error must carry an [`ErrorKind`](crate::ErrorKind) so the steady
/// layer can tell transient failures from fatal ones.
#[async_trait]
pub trait RawConnection: Send {
    /// Execute one statement with positional `?` parameters.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Start a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Check that the connection is alive.
    async fn ping(&mut self) -> Result<()>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for raw connections.
#[async_trait]
pub trait Creator: Send + Sync {
    /// Open a new raw connection.
    async fn connect(&self) -> Result<Box<dyn RawConnection>>;

    /// Concurrency level the driver supports.
    fn thread_safety(&self) -> ThreadSafety;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_safety_levels() {
        assert_eq!(ThreadSafety::from_level(0), ThreadSafety::Unsafe);
        assert_eq!(ThreadSafety::from_level(1), ThreadSafety::Module);
        assert_eq!(ThreadSafety::from_level(3), ThreadSafety::Connection);
        assert!(ThreadSafety::Connection.allows_sharing());
        assert!(!ThreadSafety::Module.allows_sharing());
        assert_eq!(ThreadSafety::Connection.level(), 2);
    }
}
