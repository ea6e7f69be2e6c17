//! Cursors over steady connections.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use steadydb_types::SqlValue;
use tokio::sync::OwnedMutexGuard;

use crate::config::PingPolicy;
use crate::error::{Error, Result};
use crate::row::{ColMetaData, Column, QueryResult, Row};
use crate::steady::SteadyConnection;

/// Access to the connection a cursor runs on.
///
/// Dedicated connections are borrowed; shared connections are locked for
/// the lifetime of the cursor, so statements from different owners never
/// interleave on one connection.
pub enum ConnRef<'a> {
    /// Exclusively borrowed connection.
    Borrowed(&'a mut SteadyConnection),
    /// Locked shared connection.
    Shared(OwnedMutexGuard<SteadyConnection>),
}

impl Deref for ConnRef<'_> {
    type Target = SteadyConnection;

    fn deref(&self) -> &SteadyConnection {
        match self {
            Self::Borrowed(c) => c,
            Self::Shared(g) => g,
        }
    }
}

impl DerefMut for ConnRef<'_> {
    fn deref_mut(&mut self) -> &mut SteadyConnection {
        match self {
            Self::Borrowed(c) => c,
            Self::Shared(g) => g,
        }
    }
}

/// Executes statements and hands out their rows one at a time.
pub struct Cursor<'a> {
    conn: ConnRef<'a>,
    metadata: Arc<ColMetaData>,
    rows: Option<std::vec::IntoIter<Row>>,
    rowcount: Option<u64>,
    last_insert_id: Option<i64>,
}

impl<'a> Cursor<'a> {
    /// Open a cursor, pinging first if the policy asks for it on cursor
    /// creation and no transaction is open.
    pub async fn open(mut conn: ConnRef<'a>) -> Self {
        if !conn.in_transaction() {
            conn.ping_check(PingPolicy::ON_CURSOR).await;
        }
        Self {
            conn,
            metadata: Arc::default(),
            rows: None,
            rowcount: None,
            last_insert_id: None,
        }
    }

    /// Execute a statement, replacing any pending result set.
    ///
    /// Returns the affected row count for writes or the number of rows
    /// produced for queries.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let result = self.conn.execute(sql, params).await?;
        Ok(self.store(result))
    }

    /// Fetch the next row of the current result set.
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.as_mut().ok_or(Error::NoResultSet)?.next())
    }

    /// Fetch all remaining rows of the current result set.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        Ok(self.rows.as_mut().ok_or(Error::NoResultSet)?.collect())
    }

    /// Column metadata of the current result set.
    #[must_use]
    pub fn description(&self) -> &[Column] {
        &self.metadata.columns
    }

    /// Row count of the last statement, `None` before any statement ran.
    #[must_use]
    pub fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    /// Identity generated by the last insert.
    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    /// Connection the cursor runs on.
    #[must_use]
    pub fn connection(&mut self) -> &mut SteadyConnection {
        &mut self.conn
    }

    fn store(&mut self, result: QueryResult) -> u64 {
        let count = if result.has_result_set() {
            result.rows.len() as u64
        } else {
            result.rows_affected
        };
        self.rowcount = Some(count);
        self.last_insert_id = result.last_insert_id;
        self.rows = result.has_result_set().then(|| result.rows.into_iter());
        self.metadata = result.metadata;
        count
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("connection", &*self.conn)
            .field("rowcount", &self.rowcount)
            .finish_non_exhaustive()
    }
}
