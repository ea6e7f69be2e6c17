//! Pool configuration.

use steadydb_client::{FailureSet, PingPolicy, SteadyConfig, ThreadSafety};

use crate::error::PoolError;

/// How a connection is cleaned up when it returns to the idle cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Always issue a rollback.
    #[default]
    Always,
    /// Roll back only transactions started through `begin`.
    TransactionsOnly,
}

impl ResetPolicy {
    /// Whether a rollback is issued even without a tracked transaction.
    #[must_use]
    pub fn force(self) -> bool {
        self == Self::Always
    }
}

impl From<bool> for ResetPolicy {
    fn from(always: bool) -> Self {
        if always {
            Self::Always
        } else {
            Self::TransactionsOnly
        }
    }
}

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
///
/// Zero means "unlimited" for `max_cached` and `max_connections`, and
/// "no sharing" for `max_shared`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Idle connections opened when the pool is created.
    pub min_cached: usize,

    /// Maximum number of idle connections kept in the cache.
    pub max_cached: usize,

    /// Maximum number of shared connections.
    pub max_shared: usize,

    /// Maximum number of connections checked out at once.
    pub max_connections: usize,

    /// Wait for capacity instead of failing with
    /// [`PoolError::TooManyConnections`].
    pub blocking: bool,

    /// Cleanup applied when a connection returns to the idle cache.
    pub reset: ResetPolicy,

    /// Settings for every steady connection the pool opens.
    pub steady: SteadyConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_cached: 0,
            max_cached: 0,
            max_shared: 0,
            max_connections: 0,
            blocking: false,
            reset: ResetPolicy::Always,
            steady: SteadyConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connections opened up front.
    #[must_use]
    pub fn min_cached(mut self, count: usize) -> Self {
        self.min_cached = count;
        self
    }

    /// Set the idle cache bound.
    #[must_use]
    pub fn max_cached(mut self, count: usize) -> Self {
        self.max_cached = count;
        self
    }

    /// Set the number of shared connections.
    #[must_use]
    pub fn max_shared(mut self, count: usize) -> Self {
        self.max_shared = count;
        self
    }

    /// Set the connection ceiling.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.max_connections = count;
        self
    }

    /// Block instead of failing when the ceiling is reached.
    #[must_use]
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Set the reset policy.
    #[must_use]
    pub fn reset(mut self, reset: impl Into<ResetPolicy>) -> Self {
        self.reset = reset.into();
        self
    }

    /// Set the maximum reuse count of a connection.
    #[must_use]
    pub fn max_usage(mut self, max_usage: u64) -> Self {
        self.steady.max_usage = max_usage;
        self
    }

    /// Set the session setup statements.
    #[must_use]
    pub fn set_session<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steady = self.steady.set_session(statements);
        self
    }

    /// Set the error kinds that trigger a reconnect.
    #[must_use]
    pub fn failures(mut self, failures: FailureSet) -> Self {
        self.steady.failures = failures;
        self
    }

    /// Set the ping policy.
    #[must_use]
    pub fn ping(mut self, ping: PingPolicy) -> Self {
        self.steady.ping = ping;
        self
    }

    /// Resolve the effective limits for a driver.
    ///
    /// - fails with [`PoolError::NotSupported`] for thread-unsafe drivers
    /// - raises `max_cached` to `min_cached`
    /// - disables sharing unless connections themselves are thread-safe
    /// - raises a nonzero `max_connections` to `max(max_cached, max_shared)`
    pub fn normalized(mut self, thread_safety: ThreadSafety) -> Result<Self, PoolError> {
        if thread_safety == ThreadSafety::Unsafe {
            return Err(PoolError::NotSupported(
                "database driver is not thread-safe".into(),
            ));
        }
        if self.max_cached > 0 && self.max_cached < self.min_cached {
            self.max_cached = self.min_cached;
        }
        if !thread_safety.allows_sharing() {
            self.max_shared = 0;
        }
        if self.max_connections > 0 {
            self.max_connections = self
                .max_connections
                .max(self.max_cached)
                .max(self.max_shared);
        }
        // Pooled connections always close for real when the pool evicts them.
        self.steady.closeable = true;
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_shared, 0);
        assert!(!config.blocking);
        assert_eq!(config.reset, ResetPolicy::Always);
        assert_eq!(config.steady.ping, PingPolicy::ON_FETCH);
    }

    #[test]
    fn test_reset_from_bool() {
        assert_eq!(ResetPolicy::from(true), ResetPolicy::Always);
        assert_eq!(ResetPolicy::from(false), ResetPolicy::TransactionsOnly);
        assert!(ResetPolicy::Always.force());
        assert!(!ResetPolicy::TransactionsOnly.force());
    }

    #[test]
    fn test_normalized_raises_limits() {
        let config = PoolConfig::new()
            .min_cached(4)
            .max_cached(2)
            .max_shared(6)
            .max_connections(3)
            .normalized(ThreadSafety::Connection)
            .unwrap();
        assert_eq!(config.max_cached, 4);
        assert_eq!(config.max_connections, 6);
    }

    #[test]
    fn test_normalized_keeps_unlimited() {
        let config = PoolConfig::new()
            .max_cached(5)
            .normalized(ThreadSafety::Connection)
            .unwrap();
        assert_eq!(config.max_connections, 0);

        let config = PoolConfig::new()
            .min_cached(3)
            .normalized(ThreadSafety::Connection)
            .unwrap();
        assert_eq!(config.max_cached, 0);
    }

    #[test]
    fn test_normalized_disables_sharing_for_module_level_safety() {
        let config = PoolConfig::new()
            .max_shared(5)
            .max_connections(2)
            .normalized(ThreadSafety::Module)
            .unwrap();
        assert_eq!(config.max_shared, 0);
        assert_eq!(config.max_connections, 2);
    }

    #[test]
    fn test_normalized_rejects_unsafe_driver() {
        let result = PoolConfig::new().normalized(ThreadSafety::Unsafe);
        assert!(matches!(result, Err(PoolError::NotSupported(_))));
    }

    #[test]
    fn test_steady_settings_forwarded() {
        let config = PoolConfig::new()
            .max_usage(10)
            .set_session(["SET a = 1"])
            .ping(PingPolicy::ALWAYS)
            .reset(false);
        assert_eq!(config.steady.max_usage, 10);
        assert_eq!(config.steady.set_session.len(), 1);
        assert_eq!(config.steady.ping, PingPolicy::ALWAYS);
        assert_eq!(config.reset, ResetPolicy::TransactionsOnly);
    }
}
