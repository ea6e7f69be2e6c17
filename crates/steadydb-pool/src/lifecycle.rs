//! Connection lifecycle management.
//!
//! The pool drives every connection through the same two hooks: a health
//! check when the connection is handed out, and a reset when it comes
//! back. Keeping them behind a trait keeps the pool logic independent of
//! how a connection verifies and cleans itself.

use steadydb_client::{PingPolicy, SteadyConnection};

use crate::config::ResetPolicy;

/// Trait for connection lifecycle management.
///
/// # Native Async Traits
///
/// This uses native async functions in traits; the pool only ever calls
/// it on concrete connection types, so no trait object is needed.
#[allow(async_fn_in_trait)]
pub trait ConnectionLifecycle: Send {
    /// Verify the connection before it is handed out.
    ///
    /// Returns whether the connection is usable; a failed check never
    /// fails the checkout.
    async fn health_check(&mut self) -> bool;

    /// Clean up connection state before it re-enters the idle cache.
    async fn reset(&mut self, policy: ResetPolicy);

    /// Check if the connection can still be cached.
    fn is_valid(&self) -> bool;
}

impl ConnectionLifecycle for SteadyConnection {
    async fn health_check(&mut self) -> bool {
        self.ping_check(PingPolicy::ON_FETCH).await
    }

    async fn reset(&mut self, policy: ResetPolicy) {
        SteadyConnection::reset(self, policy.force()).await;
    }

    fn is_valid(&self) -> bool {
        !self.is_closed()
    }
}
