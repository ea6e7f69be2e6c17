//! Pooled connection handles.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use steadydb_client::{ConnRef, Cursor, QueryResult, SqlValue};

use crate::error::PoolError;
use crate::pool::{PoolInner, SharedEntry};

/// What a handle holds while it is checked out.
pub(crate) enum Slot {
    Dedicated(steadydb_client::SteadyConnection),
    Shared(Arc<SharedEntry>),
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is automatically returned to the pool.
/// Call [`release`](Self::release) to return it deterministically and
/// wait for the reset to finish.
pub struct PoolConnection {
    pool: Arc<PoolInner>,
    slot: Option<Slot>,
}

impl PoolConnection {
    pub(crate) fn new(pool: Arc<PoolInner>, slot: Slot) -> Self {
        Self {
            pool,
            slot: Some(slot),
        }
    }

    fn slot(&mut self) -> Result<&mut Slot, PoolError> {
        self.slot.as_mut().ok_or(PoolError::InvalidConnection)
    }

    /// Open a cursor on the connection.
    ///
    /// On a shared connection the cursor holds the connection's lock until
    /// it is dropped.
    pub async fn cursor(&mut self) -> Result<Cursor<'_>, PoolError> {
        let conn = match self.slot()? {
            Slot::Dedicated(conn) => ConnRef::Borrowed(conn),
            Slot::Shared(entry) => ConnRef::Shared(Arc::clone(&entry.conn).lock_owned().await),
        };
        Ok(Cursor::open(conn).await)
    }

    /// Execute one statement.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, PoolError> {
        let result = match self.slot()? {
            Slot::Dedicated(conn) => conn.execute(sql, params).await,
            Slot::Shared(entry) => entry.conn.lock().await.execute(sql, params).await,
        };
        Ok(result?)
    }

    /// Start a transaction.
    ///
    /// A shared connection in a transaction is not handed to new owners
    /// until the transaction ends.
    pub async fn begin(&mut self) -> Result<(), PoolError> {
        match self.slot()? {
            Slot::Dedicated(conn) => Ok(conn.begin().await?),
            Slot::Shared(entry) => {
                entry.in_transaction.store(true, Ordering::SeqCst);
                let mut conn = entry.conn.lock().await;
                let result = conn.begin().await;
                entry
                    .in_transaction
                    .store(conn.in_transaction(), Ordering::SeqCst);
                Ok(result?)
            }
        }
    }

    /// Commit the current transaction.
    pub async fn commit(&mut self) -> Result<(), PoolError> {
        match self.slot()? {
            Slot::Dedicated(conn) => Ok(conn.commit().await?),
            Slot::Shared(entry) => {
                let result = entry.conn.lock().await.commit().await;
                self.end_shared_transaction();
                Ok(result?)
            }
        }
    }

    /// Roll back the current transaction.
    pub async fn rollback(&mut self) -> Result<(), PoolError> {
        match self.slot()? {
            Slot::Dedicated(conn) => Ok(conn.rollback().await?),
            Slot::Shared(entry) => {
                let result = entry.conn.lock().await.rollback().await;
                self.end_shared_transaction();
                Ok(result?)
            }
        }
    }

    fn end_shared_transaction(&self) {
        if let Some(Slot::Shared(entry)) = &self.slot {
            entry.in_transaction.store(false, Ordering::SeqCst);
            self.pool.notify_released();
        }
    }

    /// Ping the underlying connection.
    pub async fn ping(&mut self) -> Result<(), PoolError> {
        let result = match self.slot()? {
            Slot::Dedicated(conn) => conn.ping().await,
            Slot::Shared(entry) => entry.conn.lock().await.ping().await,
        };
        Ok(result?)
    }

    /// Return the connection to the pool.
    ///
    /// Dedicated connections are reset into the idle cache or closed when
    /// the cache is full. Shared connections drop one share; the last share
    /// returns the connection like a dedicated one. Releasing twice is a
    /// no-op.
    pub async fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::trace!(shared = matches!(slot, Slot::Shared(_)), "returning connection to pool");
            release_slot(&self.pool, slot).await;
        }
    }

    /// Alias for [`release`](Self::release); pooled connections are never
    /// closed by their users.
    pub async fn close(&mut self) {
        self.release().await;
    }

    /// Whether this handle holds a shared connection.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self.slot, Some(Slot::Shared(_)))
    }

    /// Whether the handle has been returned to the pool.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.slot.is_none()
    }

    /// Identifier of the underlying steady connection.
    #[must_use]
    pub fn connection_id(&self) -> Option<u64> {
        match self.slot.as_ref()? {
            Slot::Dedicated(conn) => Some(conn.id()),
            Slot::Shared(entry) => Some(entry.id),
        }
    }
}

async fn release_slot(pool: &PoolInner, slot: Slot) {
    match slot {
        Slot::Dedicated(conn) => pool.cache(conn).await,
        Slot::Shared(entry) => pool.unshare(entry).await,
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };
        tracing::trace!("returning dropped connection to pool");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(&self.pool);
                handle.spawn(async move { release_slot(&pool, slot).await });
            }
            // No runtime to run the reset on; give the slot back and let
            // the connection close itself.
            Err(_) => self.pool.discard(slot),
        }
    }
}

impl std::fmt::Debug for PoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConnection")
            .field("connection_id", &self.connection_id())
            .field("shared", &self.is_shared())
            .field("released", &self.is_released())
            .finish()
    }
}
