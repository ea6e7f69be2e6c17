//! Multi-table LEFT JOIN queries.
//!
//! The records of a join are given as a tuple type, one record per join
//! item in the same order:
//!
//! ```rust,ignore
//! let repo = JoinRepository::<(Song, Singer)>::new(
//!     pool,
//!     vec![
//!         JoinItem::new("song", "s"),
//!         JoinItem::new("singer", "g").on("g.id = s.singer_id"),
//!     ],
//! )?;
//! let rows: Vec<(Song, Singer)> = repo.query().eq("s.id", 1i64).get_list().await?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use steadydb_client::Row;
use steadydb_pool::Pool;

use crate::error::{FieldError, OrmError, Result};
use crate::field::{FieldSet, quote_ident};
use crate::filter::{Filter, WhereClause};
use crate::record::{Record, decode_row};
use crate::statement;

/// One table of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinItem {
    table: String,
    alias: String,
    on: Option<String>,
}

impl JoinItem {
    /// Join `table` under `alias`.
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            on: None,
        }
    }

    /// Join condition. Ignored on the first item, which is the FROM table.
    #[must_use]
    pub fn on(mut self, condition: impl Into<String>) -> Self {
        self.on = Some(condition.into());
        self
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table alias.
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// A tuple of records filled from one joined row.
///
/// Implemented for tuples of one to four records.
pub trait JoinRecord: Send + Sized + 'static {
    /// Number of records in the tuple.
    const ARITY: usize;

    /// Field sets of the records, in tuple order.
    fn field_sets() -> Vec<&'static FieldSet>;

    /// Slice a row into consecutive column runs, one per record.
    fn decode(row: &Row) -> std::result::Result<Self, FieldError>;
}

/// Decode the record whose columns start at `*offset` and move past them.
fn decode_next<R: Record>(row: &Row, offset: &mut usize) -> std::result::Result<R, FieldError> {
    let len = R::field_set().len();
    let fields: Vec<usize> = (0..len).collect();
    let record = decode_row(row, *offset, &fields)?;
    *offset += len;
    Ok(record)
}

macro_rules! join_record {
    ($arity:expr; $($name:ident),+) => {
        impl<$($name: Record),+> JoinRecord for ($($name,)+) {
            const ARITY: usize = $arity;

            fn field_sets() -> Vec<&'static FieldSet> {
                vec![$($name::field_set()),+]
            }

            fn decode(row: &Row) -> std::result::Result<Self, FieldError> {
                let mut offset = 0;
                Ok(($(decode_next::<$name>(row, &mut offset)?,)+))
            }
        }
    };
}

join_record!(1; A);
join_record!(2; A, B);
join_record!(3; A, B, C);
join_record!(4; A, B, C, D);

/// Reads tuples of records through a fixed LEFT JOIN.
pub struct JoinRepository<T: JoinRecord> {
    pool: Pool,
    select_sql: String,
    from_sql: String,
    _records: PhantomData<fn() -> T>,
}

impl<T: JoinRecord> JoinRepository<T> {
    /// Build the join from `items`, one per record of `T`.
    ///
    /// Selects every field of every record as `alias.name`. Fails if the
    /// item count does not match `T` or an alias repeats.
    pub fn new(pool: Pool, items: Vec<JoinItem>) -> Result<Self> {
        if items.len() != T::ARITY {
            return Err(OrmError::JoinArity {
                expected: T::ARITY,
                actual: items.len(),
            });
        }
        let mut aliases = HashSet::new();
        for item in &items {
            if !aliases.insert(item.alias.as_str()) {
                return Err(OrmError::DuplicateAlias(item.alias.clone()));
            }
        }

        let columns: Vec<String> = items
            .iter()
            .zip(T::field_sets())
            .flat_map(|(item, set)| set.names().map(move |name| format!("{}.{name}", item.alias)))
            .collect();

        let mut from_sql = String::from("FROM");
        for (position, item) in items.iter().enumerate() {
            if position == 0 {
                from_sql.push_str(&format!(" {} {}", quote_ident(&item.table), item.alias));
                continue;
            }
            from_sql.push_str(&format!(" LEFT JOIN {} {}", quote_ident(&item.table), item.alias));
            if let Some(on) = &item.on {
                from_sql.push_str(&format!(" ON {on}"));
            }
        }

        let select_sql = format!("SELECT {} {from_sql}", columns.join(", "));
        Ok(Self {
            pool,
            select_sql,
            from_sql,
            _records: PhantomData,
        })
    }

    /// The SELECT prefix shared by every query.
    pub fn select_sql(&self) -> &str {
        &self.select_sql
    }

    /// Start a query over the join.
    pub fn query(&self) -> JoinQuery<'_, T> {
        JoinQuery {
            repo: self,
            clause: WhereClause::new(),
            order: None,
        }
    }
}

impl<T: JoinRecord> fmt::Debug for JoinRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinRepository")
            .field("select_sql", &self.select_sql)
            .finish_non_exhaustive()
    }
}

/// A query over a [`JoinRepository`].
///
/// Field names in predicates and ordering are qualified by alias
/// (`s.title`).
#[must_use]
pub struct JoinQuery<'r, T: JoinRecord> {
    repo: &'r JoinRepository<T>,
    clause: WhereClause,
    order: Option<String>,
}

impl<T: JoinRecord> JoinQuery<'_, T> {
    /// Sort ascending. Replaces any earlier ordering.
    pub fn order(mut self, field: &str) -> Self {
        self.order = Some(format!("ORDER BY {}", quote_ident(field)));
        self
    }

    /// Sort descending. Replaces any earlier ordering.
    pub fn order_desc(mut self, field: &str) -> Self {
        self.order = Some(format!("ORDER BY {} DESC", quote_ident(field)));
        self
    }

    /// The SELECT statement this query runs, without a LIMIT.
    pub fn sql(&self) -> String {
        let mut sql = self.repo.select_sql.clone();
        self.clause.append_to(&mut sql);
        if let Some(order) = &self.order {
            sql.push(' ');
            sql.push_str(order);
        }
        sql
    }

    fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) {}", self.repo.from_sql);
        self.clause.append_to(&mut sql);
        sql
    }

    /// Every matching row as a record tuple.
    pub async fn get_list(self) -> Result<Vec<T>> {
        let rows = statement::fetch(&self.repo.pool, &self.sql(), self.clause.params()).await?;
        decode_all(&rows)
    }

    /// Number of matching rows.
    pub async fn count(self) -> Result<u64> {
        statement::fetch_count(&self.repo.pool, &self.count_sql(), self.clause.params()).await
    }

    /// One page of record tuples and the total number of matches.
    ///
    /// `index` starts at 1.
    pub async fn page(self, index: u64, size: u64) -> Result<(Vec<T>, u64)> {
        let (rows, total) = statement::fetch_page(
            &self.repo.pool,
            &self.count_sql(),
            &self.sql(),
            self.clause.params(),
            index,
            size,
        )
        .await?;
        Ok((decode_all(&rows)?, total))
    }
}

impl<T: JoinRecord> Filter for JoinQuery<'_, T> {
    fn where_clause(&mut self) -> &mut WhereClause {
        &mut self.clause
    }
}

impl<T: JoinRecord> fmt::Debug for JoinQuery<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinQuery")
            .field("sql", &self.sql())
            .field("params", &self.clause.params())
            .finish()
    }
}

fn decode_all<T: JoinRecord>(rows: &[Row]) -> Result<Vec<T>> {
    Ok(rows
        .iter()
        .map(T::decode)
        .collect::<std::result::Result<_, _>>()?)
}
