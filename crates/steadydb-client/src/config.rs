//! Steady connection configuration.

use std::fmt;
use std::ops::BitOr;

use crate::error::ErrorKind;

/// Bitmask controlling when a connection's liveness is verified.
///
/// Bits combine freely: `PingPolicy::ON_CURSOR | PingPolicy::ON_QUERY`
/// checks when a cursor is opened and before every statement.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PingPolicy(u8);

impl PingPolicy {
    /// Never ping.
    pub const NEVER: Self = Self(0);
    /// Ping whenever the connection is fetched from a pool.
    pub const ON_FETCH: Self = Self(1);
    /// Ping when a cursor is created.
    pub const ON_CURSOR: Self = Self(2);
    /// Ping before a statement is executed.
    pub const ON_QUERY: Self = Self(4);
    /// Ping on every occasion.
    pub const ALWAYS: Self = Self(7);

    /// Build a policy from raw bits; bits above `ALWAYS` are ignored.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALWAYS.0)
    }

    /// Raw bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Check whether any bit of `occasion` is enabled.
    #[must_use]
    pub const fn intersects(self, occasion: Self) -> bool {
        self.0 & occasion.0 != 0
    }
}

impl Default for PingPolicy {
    fn default() -> Self {
        Self::ON_FETCH
    }
}

impl BitOr for PingPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PingPolicy({:#05b})", self.0)
    }
}

/// Closed set of error kinds treated as transient.
///
/// The default set holds [`ErrorKind::Operational`],
/// [`ErrorKind::Interface`] and [`ErrorKind::Internal`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailureSet(u8);

impl FailureSet {
    /// A set that matches nothing; every error propagates unchanged.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a list of kinds.
    #[must_use]
    pub fn of(kinds: &[ErrorKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, k| set.with(*k))
    }

    /// Add a kind to the set.
    #[must_use]
    pub fn with(self, kind: ErrorKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Check membership.
    #[must_use]
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Check whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for FailureSet {
    fn default() -> Self {
        Self::of(&[
            ErrorKind::Operational,
            ErrorKind::Interface,
            ErrorKind::Internal,
        ])
    }
}

impl fmt::Debug for FailureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(ErrorKind::ALL.iter().filter(|k| self.contains(**k)))
            .finish()
    }
}

/// Configuration for a [`SteadyConnection`](crate::SteadyConnection).
///
/// This struct is marked `#[non_exhaustive]`; build it with
/// [`SteadyConfig::new()`] and the builder methods.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SteadyConfig {
    /// Maximum number of statements before the connection is reopened.
    /// Zero means unlimited reuse.
    pub max_usage: u64,

    /// Statements run on every freshly opened raw connection.
    pub set_session: Vec<String>,

    /// Error kinds that trigger a transparent reconnect.
    pub failures: FailureSet,

    /// When to verify liveness.
    pub ping: PingPolicy,

    /// Whether `close()` really closes the connection.
    ///
    /// A non-closeable connection ignores `close()` except for rolling back
    /// an open transaction.
    pub closeable: bool,
}

impl Default for SteadyConfig {
    fn default() -> Self {
        Self {
            max_usage: 0,
            set_session: Vec::new(),
            failures: FailureSet::default(),
            ping: PingPolicy::default(),
            closeable: true,
        }
    }
}

impl SteadyConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum usage count.
    #[must_use]
    pub fn max_usage(mut self, max_usage: u64) -> Self {
        self.max_usage = max_usage;
        self
    }

    /// Set the session setup statements.
    #[must_use]
    pub fn set_session<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_session = statements.into_iter().map(Into::into).collect();
        self
    }

    /// Set the transient failure kinds.
    #[must_use]
    pub fn failures(mut self, failures: FailureSet) -> Self {
        self.failures = failures;
        self
    }

    /// Set the ping policy.
    #[must_use]
    pub fn ping(mut self, ping: PingPolicy) -> Self {
        self.ping = ping;
        self
    }

    /// Set whether `close()` really closes.
    #[must_use]
    pub fn closeable(mut self, closeable: bool) -> Self {
        self.closeable = closeable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_policy_bits() {
        assert_eq!(PingPolicy::default(), PingPolicy::ON_FETCH);
        let p = PingPolicy::ON_CURSOR | PingPolicy::ON_QUERY;
        assert!(p.intersects(PingPolicy::ON_QUERY));
        assert!(!p.intersects(PingPolicy::ON_FETCH));
        assert!(!PingPolicy::NEVER.intersects(PingPolicy::ALWAYS));
        assert_eq!(PingPolicy::from_bits(0xff), PingPolicy::ALWAYS);
    }

    #[test]
    fn test_default_failure_set() {
        let set = FailureSet::default();
        assert!(set.contains(ErrorKind::Operational));
        assert!(set.contains(ErrorKind::Interface));
        assert!(set.contains(ErrorKind::Internal));
        assert!(!set.contains(ErrorKind::Programming));
        assert!(FailureSet::empty().is_empty());
    }

    #[test]
    fn test_steady_config_builder() {
        let config = SteadyConfig::new()
            .max_usage(3)
            .set_session(["SET NAMES utf8mb4"])
            .ping(PingPolicy::ALWAYS)
            .closeable(false);
        assert_eq!(config.max_usage, 3);
        assert_eq!(config.set_session, vec!["SET NAMES utf8mb4".to_string()]);
        assert!(!config.closeable);
    }
}
