//! Self-healing connection wrapper.
//!
//! A [`SteadyConnection`] owns one raw driver connection and replaces it
//! transparently when it fails with an error kind from the configured
//! [`FailureSet`](crate::FailureSet). Recovery is suspended while a
//! transaction is open: reconnecting would silently drop the work done so
//! far, so the failure is surfaced instead and the caller decides.
//!
//! ```text
//! open() ──► ready ──begin()──► in transaction ──commit()/rollback()──► ready
//!              │                                                     │
//!              └── failure / max_usage reached ──► reopen() ─────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use steadydb_types::SqlValue;

use crate::config::{PingPolicy, SteadyConfig};
use crate::cursor::{ConnRef, Cursor};
use crate::driver::{Creator, RawConnection, ThreadSafety};
use crate::error::{Error, Result};
use crate::row::QueryResult;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of a steady connection's bookkeeping.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection.
    pub id: u64,
    /// When the steady connection was created.
    pub created_at: Instant,
    /// When a statement last succeeded.
    pub last_used_at: Instant,
    /// When the last successful ping happened.
    pub last_checked_at: Option<Instant>,
    /// Statements executed since the raw connection was (re)opened.
    pub usage: u64,
    /// Number of times the raw connection was replaced.
    pub reconnects: u64,
}

/// A database connection that reconnects after transient failures.
pub struct SteadyConnection {
    creator: Arc<dyn Creator>,
    config: Arc<SteadyConfig>,
    raw: Option<Box<dyn RawConnection>>,
    usage: u64,
    transaction: bool,
    closed: bool,
    id: u64,
    created_at: Instant,
    last_used_at: Instant,
    last_checked_at: Option<Instant>,
    reconnects: u64,
}

impl SteadyConnection {
    /// Open a new steady connection.
    ///
    /// Runs the configured session setup statements on the fresh raw
    /// connection before returning.
    pub async fn open(creator: Arc<dyn Creator>, config: Arc<SteadyConfig>) -> Result<Self> {
        let raw = create(creator.as_ref(), &config).await?;
        let now = Instant::now();
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(connection_id = id, "opened steady connection");
        Ok(Self {
            creator,
            config,
            raw: Some(raw),
            usage: 0,
            transaction: false,
            closed: false,
            id,
            created_at: now,
            last_used_at: now,
            last_checked_at: None,
            reconnects: 0,
        })
    }

    /// Unique identifier of this connection.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Statements executed since the raw connection was last (re)opened.
    #[must_use]
    pub fn usage(&self) -> u64 {
        self.usage
    }

    /// Whether a transaction started with [`begin`](Self::begin) is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction
    }

    /// Whether the connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Configuration this connection was opened with.
    #[must_use]
    pub fn config(&self) -> &SteadyConfig {
        &self.config
    }

    /// Concurrency level of the underlying driver.
    #[must_use]
    pub fn thread_safety(&self) -> ThreadSafety {
        self.creator.thread_safety()
    }

    /// Snapshot of the connection's bookkeeping.
    #[must_use]
    pub fn metadata(&self) -> ConnectionMetadata {
        ConnectionMetadata {
            id: self.id,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            last_checked_at: self.last_checked_at,
            usage: self.usage,
            reconnects: self.reconnects,
        }
    }

    /// Replace the raw connection with a fresh one.
    ///
    /// The new connection is opened before the old one is closed, so a
    /// failed reopen leaves the current raw connection in place.
    pub async fn reopen(&mut self) -> Result<()> {
        let raw = create(self.creator.as_ref(), &self.config).await?;
        self.close_raw().await;
        self.raw = Some(raw);
        self.closed = false;
        self.transaction = false;
        self.usage = 0;
        self.reconnects += 1;
        tracing::debug!(connection_id = self.id, "reopened steady connection");
        Ok(())
    }

    /// Verify liveness if `occasion` is enabled by the ping policy.
    ///
    /// A dead connection is reopened unless a transaction is open. Returns
    /// whether the connection is usable afterwards; this never fails.
    pub async fn ping_check(&mut self, occasion: PingPolicy) -> bool {
        if !self.config.ping.intersects(occasion) {
            return true;
        }
        let alive = match self.raw.as_mut() {
            Some(raw) => raw.ping().await.is_ok(),
            None => false,
        };
        if alive {
            self.last_checked_at = Some(Instant::now());
            return true;
        }
        if self.transaction {
            tracing::warn!(
                connection_id = self.id,
                "ping failed inside a transaction, not reconnecting"
            );
            return false;
        }
        match self.reopen().await {
            Ok(()) => {
                self.last_checked_at = Some(Instant::now());
                true
            }
            Err(e) => {
                tracing::warn!(connection_id = self.id, error = %e, "reconnect after failed ping failed");
                false
            }
        }
    }

    /// Ping the raw connection unconditionally, without recovery.
    pub async fn ping(&mut self) -> Result<()> {
        self.raw_mut()?.ping().await?;
        self.last_checked_at = Some(Instant::now());
        Ok(())
    }

    /// Open a cursor on this connection.
    pub async fn cursor(&mut self) -> Cursor<'_> {
        Cursor::open(ConnRef::Borrowed(self)).await
    }

    /// Execute one statement, recovering from transient failures.
    ///
    /// Outside a transaction a failure from the configured set reopens the
    /// connection and retries once; the retry's outcome is returned. Inside
    /// a transaction the failure is returned unchanged.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let transaction = self.transaction;
        if !transaction {
            self.ping_check(PingPolicy::ON_QUERY).await;
            let max_usage = self.config.max_usage;
            if max_usage > 0 && self.usage >= max_usage {
                tracing::debug!(connection_id = self.id, usage = self.usage, "max usage reached");
                self.reopen().await?;
            }
        }

        match self.raw_execute(sql, params).await {
            Ok(result) => {
                self.touch();
                Ok(result)
            }
            Err(e) if transaction || !e.is_failure(&self.config.failures) => Err(e),
            Err(e) => {
                tracing::warn!(connection_id = self.id, error = %e, "statement failed, reconnecting");
                if let Err(reopen_err) = self.reopen().await {
                    tracing::warn!(connection_id = self.id, error = %reopen_err, "reconnect failed");
                    return Err(e);
                }
                let result = self.raw_execute(sql, params).await?;
                self.touch();
                Ok(result)
            }
        }
    }

    /// Start a transaction.
    ///
    /// Transient failures are not recovered until the transaction ends.
    pub async fn begin(&mut self) -> Result<()> {
        if self.raw.is_none() && !self.transaction {
            self.reopen().await?;
        }
        self.transaction = true;
        self.raw_mut()?.begin().await
    }

    /// Commit the current transaction.
    ///
    /// The transaction flag is cleared first. A failure from the configured
    /// set reopens the connection before the error is returned.
    pub async fn commit(&mut self) -> Result<()> {
        self.transaction = false;
        let result = match self.raw.as_mut() {
            Some(raw) => raw.commit().await,
            None => Err(Error::Closed),
        };
        self.recover_after(result).await
    }

    /// Roll back the current transaction.
    ///
    /// Behaves like [`commit`](Self::commit) on failure.
    pub async fn rollback(&mut self) -> Result<()> {
        self.transaction = false;
        let result = match self.raw.as_mut() {
            Some(raw) => raw.rollback().await,
            None => Err(Error::Closed),
        };
        self.recover_after(result).await
    }

    /// Close the connection if it is closeable.
    ///
    /// A non-closeable connection stays open; an open transaction on it is
    /// rolled back instead.
    pub async fn close(&mut self) {
        if self.config.closeable {
            self.close_raw().await;
        } else if self.transaction {
            self.reset(false).await;
        }
    }

    /// Close the connection regardless of the closeable setting.
    pub async fn force_close(&mut self) {
        self.close_raw().await;
    }

    /// Roll back before the connection is reused.
    ///
    /// With `force` a rollback is always issued; otherwise only when a
    /// transaction was started with [`begin`](Self::begin). Errors are
    /// logged and ignored.
    pub async fn reset(&mut self, force: bool) {
        if self.closed || !(force || self.transaction) {
            return;
        }
        if let Err(e) = self.rollback().await {
            tracing::warn!(connection_id = self.id, error = %e, "rollback during reset failed");
        }
    }

    async fn raw_execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.raw_mut()?.execute(sql, params).await
    }

    fn raw_mut(&mut self) -> Result<&mut Box<dyn RawConnection>> {
        self.raw.as_mut().ok_or(Error::Closed)
    }

    fn touch(&mut self) {
        self.usage += 1;
        self.last_used_at = Instant::now();
    }

    async fn recover_after(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            if e.is_failure(&self.config.failures) {
                tracing::warn!(connection_id = self.id, error = %e, "transaction end failed, reconnecting");
                if let Err(reopen_err) = self.reopen().await {
                    tracing::warn!(connection_id = self.id, error = %reopen_err, "reconnect failed");
                }
            }
        }
        result
    }

    async fn close_raw(&mut self) {
        if let Some(mut raw) = self.raw.take() {
            if let Err(e) = raw.close().await {
                tracing::warn!(connection_id = self.id, error = %e, "error closing raw connection");
            }
        }
        self.transaction = false;
        self.closed = true;
    }
}

impl std::fmt::Debug for SteadyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteadyConnection")
            .field("id", &self.id)
            .field("usage", &self.usage)
            .field("transaction", &self.transaction)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Connect and prepare the session of a new raw connection.
async fn create(creator: &dyn Creator, config: &SteadyConfig) -> Result<Box<dyn RawConnection>> {
    let mut raw = creator.connect().await?;
    for statement in &config.set_session {
        if let Err(e) = raw.execute(statement, &[]).await {
            let _ = raw.close().await;
            return Err(e);
        }
    }
    Ok(raw)
}
