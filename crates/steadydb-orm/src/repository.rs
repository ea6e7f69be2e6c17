//! Single-table repositories.

use std::fmt;
use std::marker::PhantomData;

use steadydb_client::SqlValue;
use steadydb_pool::Pool;

use crate::error::{OrmError, Result};
use crate::field::{FieldSet, quote_ident};
use crate::query::Query;
use crate::record::Record;
use crate::statement;
use crate::update::Update;

/// Column conventions of a repository's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Database-generated identity column, left out of inserts.
    pub identity: String,
    /// Creation timestamp column.
    pub created_at: Option<String>,
    /// Modification timestamp column.
    pub updated_at: Option<String>,
    /// Stamp the timestamp columns on insert and update.
    pub fill_time: bool,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            identity: "id".to_string(),
            created_at: Some("ct".to_string()),
            updated_at: Some("ut".to_string()),
            fill_time: true,
        }
    }
}

impl RepositoryOptions {
    /// Create options with the default conventions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity column.
    #[must_use]
    pub fn identity(mut self, column: impl Into<String>) -> Self {
        self.identity = column.into();
        self
    }

    /// Set or clear the creation timestamp column.
    #[must_use]
    pub fn created_at(mut self, column: Option<&str>) -> Self {
        self.created_at = column.map(str::to_string);
        self
    }

    /// Set or clear the modification timestamp column.
    #[must_use]
    pub fn updated_at(mut self, column: Option<&str>) -> Self {
        self.updated_at = column.map(str::to_string);
        self
    }

    /// Enable or disable timestamp filling.
    #[must_use]
    pub fn fill_time(mut self, enabled: bool) -> Self {
        self.fill_time = enabled;
        self
    }
}

/// Reads and writes records of type `R` in one table.
///
/// The insert statement and the full column list are built once here.
/// Every operation acquires its own connection from the pool.
pub struct Repository<R: Record> {
    pool: Pool,
    table: String,
    options: RepositoryOptions,
    insert_sql: String,
    insert_fields: Vec<usize>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Repository<R> {
    /// Create a repository with the default column conventions.
    pub fn new(pool: Pool, table: impl Into<String>) -> Self {
        Self::with_options(pool, table, RepositoryOptions::default())
    }

    /// Create a repository with custom column conventions.
    pub fn with_options(pool: Pool, table: impl Into<String>, options: RepositoryOptions) -> Self {
        let table = table.into();
        let insert_fields: Vec<usize> = R::field_set()
            .fields()
            .iter()
            .filter(|f| f.name() != options.identity)
            .map(|f| f.index())
            .collect();
        let insert_sql = insert_sql(&table, R::field_set(), &insert_fields);
        Self {
            pool,
            table,
            options,
            insert_sql,
            insert_fields,
            _record: PhantomData,
        }
    }

    /// The pool this repository draws connections from.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column conventions.
    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// The insert statement used by [`insert`](Self::insert).
    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    /// Insert `record` and commit.
    ///
    /// With `fill_time` on, the creation and modification fields are set
    /// to the current local time first. The generated identity is written
    /// back onto `record` and returned.
    pub async fn insert(&self, record: &mut R) -> Result<Option<i64>> {
        let fields = R::field_set();
        if self.options.fill_time {
            let now = SqlValue::DateTime(chrono::Local::now().naive_local());
            for column in [&self.options.created_at, &self.options.updated_at]
                .into_iter()
                .flatten()
            {
                if let Some(index) = fields.index_of(column) {
                    record.assign(index, &now)?;
                }
            }
        }

        let params = self
            .insert_fields
            .iter()
            .map(|&i| record.value(i))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let result = statement::write(&self.pool, &self.insert_sql, &params).await?;

        let Some(index) = fields.index_of(&self.options.identity) else {
            return Ok(result.last_insert_id);
        };
        let id = result.last_insert_id.ok_or_else(|| OrmError::MissingIdentity {
            table: self.table.clone(),
        })?;
        record.assign(index, &SqlValue::BigInt(id))?;
        Ok(Some(id))
    }

    /// Start a query over this table.
    pub fn query(&self) -> Query<'_, R> {
        Query::new(self)
    }

    /// Start an update of this table.
    pub fn update(&self) -> Update<'_, R> {
        Update::new(self)
    }
}

fn insert_sql(table: &str, fields: &FieldSet, insert_fields: &[usize]) -> String {
    let table = quote_ident(table);
    if insert_fields.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES");
    }
    let columns: Vec<String> = insert_fields
        .iter()
        .filter_map(|&i| fields.field(i))
        .map(|f| quote_ident(f.name()))
        .collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    )
}

impl<R: Record> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table.clone(),
            options: self.options.clone(),
            insert_sql: self.insert_sql.clone(),
            insert_fields: self.insert_fields.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &R::field_set().entity())
            .field("table", &self.table)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
