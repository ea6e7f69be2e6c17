//! SQLite driver adapter for integration tests.
//!
//! Runs real SQL through the bundled SQLite engine so repository tests
//! exercise genuine statements, pagination and identity generation.
//! Every connection opens the same database file, which normally lives in
//! a [`tempfile::TempDir`] owned by the test.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{Connection, ErrorCode, params_from_iter};
use steadydb_client::{
    ColMetaData, Creator, Error, ErrorKind, QueryResult, RawConnection, Result, SqlValue,
    ThreadSafety,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens connections to one SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteCreator {
    path: PathBuf,
    thread_safety: ThreadSafety,
}

impl SqliteCreator {
    /// Create a creator for the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            thread_safety: ThreadSafety::Connection,
        }
    }

    /// Override the reported thread-safety level.
    #[must_use]
    pub fn with_thread_safety(mut self, level: ThreadSafety) -> Self {
        self.thread_safety = level;
        self
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Creator for SqliteCreator {
    async fn connect(&self) -> Result<Box<dyn RawConnection>> {
        let conn = Connection::open(&self.path).map_err(map_error)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_error)?;
        tracing::trace!(path = %self.path.display(), "sqlite connection opened");
        Ok(Box::new(SqliteConnection { conn: Some(conn) }))
    }

    fn thread_safety(&self) -> ThreadSafety {
        self.thread_safety
    }
}

/// A raw SQLite connection.
pub struct SqliteConnection {
    conn: Option<Connection>,
}

impl SqliteConnection {
    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::driver(ErrorKind::Interface, "connection already closed"))
    }
}

#[async_trait]
impl RawConnection for SqliteConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let conn = self.conn()?;
        let values = params.iter().map(to_sqlite).collect::<Result<Vec<_>>>()?;
        let mut stmt = conn.prepare(sql).map_err(map_error)?;

        if stmt.column_count() == 0 {
            let affected = stmt
                .execute(params_from_iter(values.iter()))
                .map_err(map_error)?;
            let last_insert_id = is_insert(sql).then(|| conn.last_insert_rowid());
            return Ok(QueryResult::affected(affected as u64, last_insert_id));
        }

        let metadata = Arc::new(ColMetaData::from_names(
            stmt.column_names().into_iter().map(str::to_owned),
        ));
        let width = metadata.len();
        let mut rows = Vec::new();
        let mut cursor = stmt
            .query(params_from_iter(values.iter()))
            .map_err(map_error)?;
        while let Some(row) = cursor.next().map_err(map_error)? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sqlite(row.get_ref(i).map_err(map_error)?));
            }
            rows.push(values);
        }
        Ok(QueryResult::with_rows(metadata, rows))
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn()?.execute_batch("BEGIN").map_err(map_error)
    }

    async fn commit(&mut self) -> Result<()> {
        let conn = self.conn()?;
        // Autocommit mode means no transaction is open; nothing to commit.
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("COMMIT").map_err(map_error)
    }

    async fn rollback(&mut self) -> Result<()> {
        let conn = self.conn()?;
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK").map_err(map_error)
    }

    async fn ping(&mut self) -> Result<()> {
        self.conn()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(map_error)
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| map_error(e)),
            None => Ok(()),
        }
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

fn to_sqlite(value: &SqlValue) -> Result<SqliteValue> {
    Ok(match value {
        SqlValue::Null => SqliteValue::Null,
        SqlValue::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        SqlValue::Int(i) => SqliteValue::Integer(i64::from(*i)),
        SqlValue::BigInt(i) => SqliteValue::Integer(*i),
        SqlValue::Double(f) => SqliteValue::Real(*f),
        SqlValue::Text(s) => SqliteValue::Text(s.clone()),
        SqlValue::Binary(b) => SqliteValue::Blob(b.to_vec()),
        SqlValue::Date(d) => SqliteValue::Text(d.format("%Y-%m-%d").to_string()),
        SqlValue::Time(t) => SqliteValue::Text(t.format("%H:%M:%S%.f").to_string()),
        SqlValue::DateTime(dt) => {
            SqliteValue::Text(dt.format(steadydb_client::DATETIME_FORMAT).to_string())
        }
        SqlValue::Json(j) => SqliteValue::Text(
            serde_json::to_string(j)
                .map_err(|e| Error::driver(ErrorKind::Data, e.to_string()))?,
        ),
    })
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::BigInt(i),
        ValueRef::Real(f) => SqlValue::Double(f),
        ValueRef::Text(s) => SqlValue::Text(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => SqlValue::Binary(b.to_vec().into()),
    }
}

fn map_error(err: rusqlite::Error) -> Error {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::ConstraintViolation => ErrorKind::Integrity,
            ErrorCode::TypeMismatch | ErrorCode::TooBig => ErrorKind::Data,
            ErrorCode::InternalMalfunction => ErrorKind::Internal,
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::NotADatabase => ErrorKind::Operational,
            _ => ErrorKind::Programming,
        },
        rusqlite::Error::InvalidPath(_) => ErrorKind::Operational,
        _ => ErrorKind::Programming,
    };
    Error::driver(kind, err.to_string())
}
