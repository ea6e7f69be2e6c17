//! Scripted mock driver for unit testing.
//!
//! [`MockCreator`] implements the driver contracts without a database.
//! Responses are matched on the exact SQL text, falling back to a default.
//! Failures can be injected per operation by [`ErrorKind`], and every
//! connection shares one set of counters so tests can assert how often
//! the pool connected, pinged, rolled back or closed.
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadydb_testing::mock::{MockCreator, MockResponse};
//! use steadydb_client::{ErrorKind, SqlValue};
//!
//! let creator = MockCreator::builder()
//!     .with_response("SELECT 1", MockResponse::scalar(1i64))
//!     .build();
//! creator.fail_next_execute(ErrorKind::Operational);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use steadydb_client::{
    ColMetaData, Creator, Error, ErrorKind, QueryResult, RawConnection, Result, SqlValue,
    ThreadSafety,
};

type Handler = Arc<dyn Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync>;

/// Mock response configuration.
#[derive(Clone)]
pub enum MockResponse {
    /// Return rows with the given column names.
    Rows {
        /// Column names.
        columns: Vec<String>,
        /// Row data.
        rows: Vec<Vec<SqlValue>>,
    },

    /// Return an affected row count (for INSERT/UPDATE/DELETE).
    Affected {
        /// Affected rows.
        rows: u64,
        /// Generated identity.
        last_insert_id: Option<i64>,
    },

    /// Return an error.
    Error {
        /// Error classification.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },

    /// Compute the response from the statement and its parameters.
    Custom(Handler),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", rows)
                .finish(),
            Self::Affected {
                rows,
                last_insert_id,
            } => f
                .debug_struct("Affected")
                .field("rows", rows)
                .field("last_insert_id", last_insert_id)
                .finish(),
            Self::Error { kind, message } => f
                .debug_struct("Error")
                .field("kind", kind)
                .field("message", message)
                .finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// Create a single-cell response.
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        Self::Rows {
            columns: vec!["value".into()],
            rows: vec![vec![value.into()]],
        }
    }

    /// Create a multi-row response.
    pub fn rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        Self::Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Create an empty result response.
    pub fn empty() -> Self {
        Self::affected(0)
    }

    /// Create a rows affected response.
    pub fn affected(rows: u64) -> Self {
        Self::Affected {
            rows,
            last_insert_id: None,
        }
    }

    /// Create an insert response carrying a generated identity.
    pub fn inserted(last_insert_id: i64) -> Self {
        Self::Affected {
            rows: 1,
            last_insert_id: Some(last_insert_id),
        }
    }

    /// Create an error response.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Create a response computed per call.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str, &[SqlValue]) -> MockResponse + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    fn resolve(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        match self {
            Self::Rows { columns, rows } => Ok(QueryResult::with_rows(
                Arc::new(ColMetaData::from_names(columns.iter().cloned())),
                rows.clone(),
            )),
            Self::Affected {
                rows,
                last_insert_id,
            } => Ok(QueryResult::affected(*rows, *last_insert_id)),
            Self::Error { kind, message } => Err(Error::driver(*kind, message.clone())),
            Self::Custom(f) => f(sql, params).resolve(sql, params),
        }
    }
}

/// Counters shared by every connection of one [`MockCreator`].
#[derive(Debug, Default)]
pub struct MockStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    pings: AtomicUsize,
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    executes: AtomicUsize,
    open: AtomicUsize,
    peak_open: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl MockStats {
    /// Raw connections opened.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Raw connections closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Pings issued.
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Transactions started.
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    /// Commits issued.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rollbacks issued.
    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Statements executed, including failed ones.
    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    /// Raw connections currently open.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of raw connections open at the same time.
    pub fn peak_open(&self) -> usize {
        self.peak_open.load(Ordering::SeqCst)
    }

    /// Every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    fn opened(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Faults {
    connect: VecDeque<ErrorKind>,
    execute: VecDeque<ErrorKind>,
    ping: VecDeque<ErrorKind>,
    commit: VecDeque<ErrorKind>,
}

struct MockInner {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    thread_safety: ThreadSafety,
    latency: Option<Duration>,
    stats: MockStats,
    faults: Mutex<Faults>,
    next_id: AtomicU64,
    // Connections with an id at or below this value behave as if the server
    // dropped them.
    severed_through: AtomicU64,
}

/// Builder for a [`MockCreator`].
pub struct MockCreatorBuilder {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    thread_safety: ThreadSafety,
    latency: Option<Duration>,
}

impl MockCreatorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: MockResponse::empty(),
            thread_safety: ThreadSafety::Connection,
            latency: None,
        }
    }

    /// Add a response for an exact SQL text.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into(), response);
        self
    }

    /// Set the response for statements without a match.
    #[must_use]
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Set the reported thread-safety level.
    #[must_use]
    pub fn with_thread_safety(mut self, level: ThreadSafety) -> Self {
        self.thread_safety = level;
        self
    }

    /// Delay every statement by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Build the creator.
    pub fn build(self) -> MockCreator {
        MockCreator {
            inner: Arc::new(MockInner {
                responses: self.responses,
                default_response: self.default_response,
                thread_safety: self.thread_safety,
                latency: self.latency,
                stats: MockStats::default(),
                faults: Mutex::new(Faults::default()),
                next_id: AtomicU64::new(1),
                severed_through: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for MockCreatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock driver factory.
///
/// Cloning is cheap; clones share counters and injected faults.
#[derive(Clone)]
pub struct MockCreator {
    inner: Arc<MockInner>,
}

impl MockCreator {
    /// Create a builder.
    pub fn builder() -> MockCreatorBuilder {
        MockCreatorBuilder::new()
    }

    /// Create a creator answering every statement with an empty result.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Shared counters.
    pub fn stats(&self) -> &MockStats {
        &self.inner.stats
    }

    /// Make the next connect fail with `kind`.
    pub fn fail_next_connect(&self, kind: ErrorKind) {
        self.inner.faults.lock().connect.push_back(kind);
    }

    /// Make the next statement on any connection fail with `kind`.
    pub fn fail_next_execute(&self, kind: ErrorKind) {
        self.inner.faults.lock().execute.push_back(kind);
    }

    /// Make the next ping on any connection fail with `kind`.
    pub fn fail_next_ping(&self, kind: ErrorKind) {
        self.inner.faults.lock().ping.push_back(kind);
    }

    /// Make the next commit on any connection fail with `kind`.
    pub fn fail_next_commit(&self, kind: ErrorKind) {
        self.inner.faults.lock().commit.push_back(kind);
    }

    /// Drop every connection opened so far, as a server restart would.
    ///
    /// Those connections fail every later operation with an operational
    /// error; connections opened afterwards work normally.
    pub fn sever_all(&self) {
        let last = self.inner.next_id.load(Ordering::SeqCst).saturating_sub(1);
        self.inner.severed_through.store(last, Ordering::SeqCst);
    }
}

impl Default for MockCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCreator")
            .field("thread_safety", &self.inner.thread_safety)
            .field("stats", &self.inner.stats)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Creator for MockCreator {
    async fn connect(&self) -> Result<Box<dyn RawConnection>> {
        if let Some(kind) = self.inner.faults.lock().connect.pop_front() {
            return Err(Error::driver(kind, "mock connect failure"));
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.stats.opened();
        tracing::trace!(mock_connection = id, "mock connection opened");
        Ok(Box::new(MockConnection {
            id,
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }

    fn thread_safety(&self) -> ThreadSafety {
        self.inner.thread_safety
    }
}

/// A connection handed out by [`MockCreator`].
pub struct MockConnection {
    id: u64,
    inner: Arc<MockInner>,
    closed: bool,
}

impl MockConnection {
    fn check(&self) -> Result<()> {
        if self.closed {
            return Err(Error::driver(ErrorKind::Interface, "connection already closed"));
        }
        if self.id <= self.inner.severed_through.load(Ordering::SeqCst) {
            return Err(Error::driver(ErrorKind::Operational, "server has gone away"));
        }
        Ok(())
    }

    fn injected(&self, pick: impl FnOnce(&mut Faults) -> Option<ErrorKind>) -> Result<()> {
        match pick(&mut self.inner.faults.lock()) {
            Some(kind) => Err(Error::driver(kind, "injected mock failure")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RawConnection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let stats = &self.inner.stats;
        stats.executes.fetch_add(1, Ordering::SeqCst);
        stats.statements.lock().push(sql.to_string());
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        self.check()?;
        self.injected(|f| f.execute.pop_front())?;
        self.inner
            .responses
            .get(sql)
            .unwrap_or(&self.inner.default_response)
            .resolve(sql, params)
    }

    async fn begin(&mut self) -> Result<()> {
        self.check()?;
        self.inner.stats.begins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.check()?;
        self.injected(|f| f.commit.pop_front())?;
        self.inner.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.check()?;
        self.inner.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.inner.stats.pings.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.injected(|f| f.ping.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.inner.stats.closed();
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.inner.stats.closed();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_and_default_responses() {
        let creator = MockCreator::builder()
            .with_response("SELECT 1", MockResponse::scalar(1i64))
            .with_default_response(MockResponse::affected(2))
            .build();
        let mut conn = creator.connect().await.unwrap();

        let result = conn.execute("SELECT 1", &[]).await.unwrap();
        assert_eq!(result.rows[0].get::<i64>(0).unwrap(), 1);

        let result = conn.execute("DELETE FROM t", &[]).await.unwrap();
        assert_eq!(result.rows_affected, 2);
        assert_eq!(creator.stats().statements(), vec!["SELECT 1", "DELETE FROM t"]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let creator = MockCreator::new();
        let mut conn = creator.connect().await.unwrap();
        creator.fail_next_execute(ErrorKind::Operational);

        let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operational);
        assert!(conn.execute("SELECT 1", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_sever_all_only_affects_existing_connections() {
        let creator = MockCreator::new();
        let mut old = creator.connect().await.unwrap();
        creator.sever_all();
        let mut new = creator.connect().await.unwrap();

        assert!(old.ping().await.is_err());
        assert!(new.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_open_counter_tracks_close_and_drop() {
        let creator = MockCreator::new();
        let mut a = creator.connect().await.unwrap();
        let b = creator.connect().await.unwrap();
        assert_eq!(creator.stats().open(), 2);

        a.close().await.unwrap();
        drop(b);
        assert_eq!(creator.stats().open(), 0);
        assert_eq!(creator.stats().peak_open(), 2);
    }
}
