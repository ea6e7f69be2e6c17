//! Connection pool implementation.
//!
//! All pool state lives behind one `parking_lot::Mutex` that is never held
//! across an `.await`. Capacity waits use a `tokio::sync::Notify` as the
//! condition variable: a waiter registers before it re-checks the state,
//! and every release wakes all waiters so each can re-check.
//!
//! `connections` counts connections handed out, dedicated and shared.
//! A slot is reserved by incrementing it before the (async) connect, and
//! handed back if the connect fails.

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use steadydb_client::{
    Creator, FailureSet, PingPolicy, SteadyConfig, SteadyConnection, ThreadSafety,
};
use tokio::sync::Notify;

use crate::config::PoolConfig;
use crate::connection::{PoolConnection, Slot};
use crate::error::PoolError;
use crate::lifecycle::ConnectionLifecycle;

/// A pool of steady connections.
///
/// Cloning is cheap; clones share the same connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

/// One shared connection and its transaction marker.
///
/// The marker is kept outside the connection's lock so the pool can skip
/// transacting connections without waiting for their current user.
pub(crate) struct SharedEntry {
    pub(crate) conn: Arc<tokio::sync::Mutex<SteadyConnection>>,
    pub(crate) in_transaction: AtomicBool,
    pub(crate) id: u64,
}

struct SharedSlot {
    entry: Arc<SharedEntry>,
    shares: usize,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<SteadyConnection>,
    shared: Vec<SharedSlot>,
    connections: usize,
    // Shared connections being opened; counted against max_shared.
    pending_shared: usize,
}

impl PoolState {
    /// Least shared entry that is not inside a transaction.
    fn least_shared(&self) -> Option<usize> {
        self.shared
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.entry.in_transaction.load(Ordering::SeqCst))
            .min_by_key(|(_, s)| s.shares)
            .map(|(i, _)| i)
    }
}

pub(crate) struct PoolInner {
    creator: Arc<dyn Creator>,
    config: PoolConfig,
    steady: Arc<SteadyConfig>,
    state: Mutex<PoolState>,
    released: Notify,
}

enum SharedDecision {
    Open(Option<SteadyConnection>),
    Share(Arc<SharedEntry>),
    Wait,
}

impl Pool {
    /// Create a pool builder.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a pool for `creator`.
    ///
    /// Fails with [`PoolError::NotSupported`] if the driver reports no
    /// thread-safety at all. Opens `min_cached` idle connections up front.
    pub async fn new(creator: Arc<dyn Creator>, config: PoolConfig) -> Result<Self, PoolError> {
        let thread_safety = creator.thread_safety();
        let config = config.normalized(thread_safety)?;
        let steady = Arc::new(config.steady.clone());

        let mut idle = VecDeque::with_capacity(config.min_cached);
        for _ in 0..config.min_cached {
            idle.push_back(SteadyConnection::open(Arc::clone(&creator), Arc::clone(&steady)).await?);
        }

        tracing::info!(
            min_cached = config.min_cached,
            max_cached = config.max_cached,
            max_shared = config.max_shared,
            max_connections = config.max_connections,
            blocking = config.blocking,
            thread_safety = thread_safety.level(),
            "connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                creator,
                config,
                steady,
                state: Mutex::new(PoolState {
                    idle,
                    ..PoolState::default()
                }),
                released: Notify::new(),
            }),
        })
    }

    /// Get a connection from the pool.
    ///
    /// A shareable request is served from the shared cache when sharing is
    /// enabled; otherwise it falls back to a dedicated connection. When the
    /// ceiling is reached the call waits for a release if the pool blocks,
    /// or fails with [`PoolError::TooManyConnections`]. There is no
    /// timeout; wrap the call in `tokio::time::timeout` if one is needed.
    pub async fn connection(&self, shareable: bool) -> Result<PoolConnection, PoolError> {
        let slot = if shareable && self.inner.config.max_shared > 0 {
            Slot::Shared(self.inner.acquire_shared().await?)
        } else {
            Slot::Dedicated(self.inner.acquire_dedicated().await?)
        };
        Ok(PoolConnection::new(Arc::clone(&self.inner), slot))
    }

    /// Get a dedicated connection; shorthand for `connection(false)`.
    pub async fn dedicated_connection(&self) -> Result<PoolConnection, PoolError> {
        self.connection(false).await
    }

    /// Open a steady connection with the pool's settings that is not
    /// counted against, or returned to, the pool.
    pub async fn steady_connection(&self) -> Result<SteadyConnection, PoolError> {
        Ok(SteadyConnection::open(
            Arc::clone(&self.inner.creator),
            Arc::clone(&self.inner.steady),
        )
        .await?)
    }

    /// Close every idle and shared connection.
    ///
    /// Close errors are ignored. Handles still holding a shared connection
    /// keep working on it, but it is not returned to the pool afterwards.
    /// The pool stays usable.
    pub async fn close_all(&self) {
        let (idle, shared) = {
            let mut state = self.inner.state.lock();
            let idle: Vec<_> = state.idle.drain(..).collect();
            let shared: Vec<_> = state.shared.drain(..).collect();
            state.connections = state.connections.saturating_sub(shared.len());
            (idle, shared)
        };
        let (idle_count, shared_count) = (idle.len(), shared.len());

        for mut conn in idle {
            conn.force_close().await;
        }
        for slot in shared {
            slot.entry.conn.lock().await.force_close().await;
        }

        tracing::info!(
            idle = idle_count,
            shared = shared_count,
            "closed all pooled connections"
        );
        self.inner.released.notify_waiters();
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        let config = &self.inner.config;
        PoolStatus {
            idle: state.idle.len(),
            shared: state.shared.len(),
            shares: state.shared.iter().map(|s| s.shares).sum(),
            connections: state.connections,
            max_cached: config.max_cached,
            max_shared: config.max_shared,
            max_connections: config.max_connections,
        }
    }

    /// Effective pool configuration, after normalization.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Concurrency level of the underlying driver.
    #[must_use]
    pub fn thread_safety(&self) -> ThreadSafety {
        self.inner.creator.thread_safety()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl PoolInner {
    fn has_capacity(&self, state: &PoolState) -> bool {
        let max = self.config.max_connections;
        max == 0 || state.connections < max
    }

    fn idle_has_room(&self, state: &PoolState) -> bool {
        let max = self.config.max_cached;
        max == 0 || state.idle.len() < max
    }

    fn too_many(&self) -> PoolError {
        PoolError::TooManyConnections {
            max: self.config.max_connections,
        }
    }

    /// Give back a reserved slot without returning a connection.
    fn free_slot(&self) {
        {
            let mut state = self.state.lock();
            state.connections = state.connections.saturating_sub(1);
        }
        self.released.notify_waiters();
    }

    async fn acquire_dedicated(&self) -> Result<SteadyConnection, PoolError> {
        loop {
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();

            let idle = {
                let mut state = self.state.lock();
                if self.has_capacity(&state) {
                    state.connections += 1;
                    Some(state.idle.pop_front())
                } else if !self.config.blocking {
                    return Err(self.too_many());
                } else {
                    None
                }
            };

            match idle {
                Some(idle) => {
                    tracing::trace!(reused = idle.is_some(), "dedicated connection acquired");
                    return self.checkout(idle).await.inspect_err(|_| self.free_slot());
                }
                None => {
                    tracing::trace!("waiting for a connection to be released");
                    notified.await;
                }
            }
        }
    }

    async fn acquire_shared(&self) -> Result<Arc<SharedEntry>, PoolError> {
        loop {
            let mut notified = pin!(self.released.notified());
            notified.as_mut().enable();

            let decision = {
                let mut state = self.state.lock();
                let room = state.shared.len() + state.pending_shared < self.config.max_shared;
                if room && self.has_capacity(&state) {
                    state.connections += 1;
                    state.pending_shared += 1;
                    SharedDecision::Open(state.idle.pop_front())
                } else if let Some(i) = state.least_shared() {
                    let slot = &mut state.shared[i];
                    slot.shares += 1;
                    SharedDecision::Share(Arc::clone(&slot.entry))
                } else if !self.config.blocking {
                    return Err(self.too_many());
                } else {
                    SharedDecision::Wait
                }
            };

            match decision {
                SharedDecision::Open(idle) => {
                    let conn = match self.checkout(idle).await {
                        Ok(conn) => conn,
                        Err(e) => {
                            self.state.lock().pending_shared -= 1;
                            self.free_slot();
                            return Err(e);
                        }
                    };
                    let entry = Arc::new(SharedEntry {
                        id: conn.id(),
                        conn: Arc::new(tokio::sync::Mutex::new(conn)),
                        in_transaction: AtomicBool::new(false),
                    });
                    {
                        let mut state = self.state.lock();
                        state.pending_shared -= 1;
                        state.shared.push(SharedSlot {
                            entry: Arc::clone(&entry),
                            shares: 1,
                        });
                    }
                    tracing::trace!(connection_id = entry.id, "new shared connection");
                    // Waiters without capacity can now share this connection.
                    self.released.notify_waiters();
                    return Ok(entry);
                }
                SharedDecision::Share(entry) => {
                    // Skip the check if another owner is using the connection right now.
                    if let Ok(mut conn) = entry.conn.try_lock() {
                        conn.health_check().await;
                    }
                    tracing::trace!(connection_id = entry.id, "sharing connection");
                    return Ok(entry);
                }
                SharedDecision::Wait => {
                    tracing::trace!("waiting for a shareable connection");
                    notified.await;
                }
            }
        }
    }

    /// Prepare a connection for handing out: check a cached one, or open a
    /// fresh one.
    async fn checkout(&self, idle: Option<SteadyConnection>) -> Result<SteadyConnection, PoolError> {
        match idle {
            Some(mut conn) => {
                conn.health_check().await;
                Ok(conn)
            }
            None => Ok(SteadyConnection::open(Arc::clone(&self.creator), Arc::clone(&self.steady)).await?),
        }
    }

    /// Return a dedicated connection: reset it into the idle cache if there
    /// is room, close it otherwise.
    pub(crate) async fn cache(&self, mut conn: SteadyConnection) {
        let room = self.idle_has_room(&self.state.lock());
        if room {
            ConnectionLifecycle::reset(&mut conn, self.config.reset).await;
            let mut state = self.state.lock();
            if conn.is_valid() && self.idle_has_room(&state) {
                state.idle.push_back(conn);
                state.connections = state.connections.saturating_sub(1);
                drop(state);
                tracing::trace!("connection returned to idle cache");
                self.released.notify_waiters();
                return;
            }
        }
        tracing::trace!("idle cache full, closing connection");
        conn.force_close().await;
        self.free_slot();
    }

    /// Drop one share of a shared connection; the last share sends the
    /// connection down the dedicated release path.
    pub(crate) async fn unshare(&self, entry: Arc<SharedEntry>) {
        let last = {
            let mut state = self.state.lock();
            let last = match state
                .shared
                .iter()
                .position(|s| Arc::ptr_eq(&s.entry, &entry))
            {
                Some(i) => {
                    state.shared[i].shares -= 1;
                    if state.shared[i].shares == 0 {
                        state.shared.remove(i);
                        true
                    } else {
                        false
                    }
                }
                // Already closed by close_all, which also freed its slot.
                None => false,
            };
            // A co-sharer lets go of its reference under the lock, so the
            // last releaser always holds the only one.
            if last {
                Some(entry)
            } else {
                drop(entry);
                None
            }
        };

        let Some(entry) = last else {
            self.released.notify_waiters();
            return;
        };

        let conn = match Arc::try_unwrap(entry) {
            Ok(entry) => entry.conn,
            Err(entry) => Arc::clone(&entry.conn),
        };
        match Arc::try_unwrap(conn) {
            Ok(conn) => self.cache(conn.into_inner()).await,
            Err(conn) => {
                tracing::warn!("shared connection still referenced on release, closing");
                conn.lock().await.force_close().await;
                self.free_slot();
            }
        }
    }

    /// Synchronous release used when no runtime is available: frees the
    /// slot and lets the connection drop.
    pub(crate) fn discard(&self, slot: Slot) {
        {
            let mut state = self.state.lock();
            match &slot {
                Slot::Dedicated(_) => {
                    state.connections = state.connections.saturating_sub(1);
                }
                Slot::Shared(entry) => {
                    if let Some(i) = state
                        .shared
                        .iter()
                        .position(|s| Arc::ptr_eq(&s.entry, entry))
                    {
                        state.shared[i].shares -= 1;
                        if state.shared[i].shares == 0 {
                            state.shared.remove(i);
                            state.connections = state.connections.saturating_sub(1);
                        }
                    }
                }
            }
        }
        self.released.notify_waiters();
    }

    pub(crate) fn notify_released(&self) {
        self.released.notify_waiters();
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Idle connections in the cache.
    pub idle: usize,
    /// Shared connections currently handed out.
    pub shared: usize,
    /// Sum of the share counts of all shared connections.
    pub shares: usize,
    /// Connections checked out, dedicated and shared.
    pub connections: usize,
    /// Effective idle cache bound (0 = unlimited).
    pub max_cached: usize,
    /// Effective shared connection bound (0 = sharing disabled).
    pub max_shared: usize,
    /// Effective connection ceiling (0 = unlimited).
    pub max_connections: usize,
}

/// Builder for [`Pool`].
#[derive(Default)]
pub struct PoolBuilder {
    creator: Option<Arc<dyn Creator>>,
    config: PoolConfig,
}

impl PoolBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the driver factory.
    #[must_use]
    pub fn creator(mut self, creator: impl Creator + 'static) -> Self {
        self.creator = Some(Arc::new(creator));
        self
    }

    /// Set an already shared driver factory.
    #[must_use]
    pub fn creator_arc(mut self, creator: Arc<dyn Creator>) -> Self {
        self.creator = Some(creator);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of connections opened up front.
    #[must_use]
    pub fn min_cached(mut self, count: usize) -> Self {
        self.config = self.config.min_cached(count);
        self
    }

    /// Set the idle cache bound.
    #[must_use]
    pub fn max_cached(mut self, count: usize) -> Self {
        self.config = self.config.max_cached(count);
        self
    }

    /// Set the number of shared connections.
    #[must_use]
    pub fn max_shared(mut self, count: usize) -> Self {
        self.config = self.config.max_shared(count);
        self
    }

    /// Set the connection ceiling.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config = self.config.max_connections(count);
        self
    }

    /// Block instead of failing when the ceiling is reached.
    #[must_use]
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.config = self.config.blocking(blocking);
        self
    }

    /// Set the reset policy.
    #[must_use]
    pub fn reset(mut self, reset: impl Into<crate::ResetPolicy>) -> Self {
        self.config = self.config.reset(reset);
        self
    }

    /// Set the maximum reuse count of a connection.
    #[must_use]
    pub fn max_usage(mut self, max_usage: u64) -> Self {
        self.config = self.config.max_usage(max_usage);
        self
    }

    /// Set the session setup statements.
    #[must_use]
    pub fn set_session<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.set_session(statements);
        self
    }

    /// Set the error kinds that trigger a reconnect.
    #[must_use]
    pub fn failures(mut self, failures: FailureSet) -> Self {
        self.config = self.config.failures(failures);
        self
    }

    /// Set the ping policy.
    #[must_use]
    pub fn ping(mut self, ping: PingPolicy) -> Self {
        self.config = self.config.ping(ping);
        self
    }

    /// Build the pool.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let creator = self
            .creator
            .ok_or_else(|| PoolError::Configuration("a creator is required".into()))?;
        Pool::new(creator, self.config).await
    }
}
