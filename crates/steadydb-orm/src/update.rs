//! UPDATE builder.

use steadydb_client::SqlValue;

use crate::error::{OrmError, Result};
use crate::field::quote_ident;
use crate::filter::{Filter, WhereClause};
use crate::record::Record;
use crate::repository::Repository;
use crate::statement;
use crate::value::{FieldValue, encode};

/// An update of one repository's table.
///
/// Running it requires at least one SET item and a non-empty WHERE
/// clause. Both are checked before a connection is acquired.
#[must_use]
pub struct Update<'r, R: Record> {
    repo: &'r Repository<R>,
    sets: Vec<String>,
    params: Vec<SqlValue>,
    clause: WhereClause,
    fill_time: bool,
}

impl<'r, R: Record> Update<'r, R> {
    pub(crate) fn new(repo: &'r Repository<R>) -> Self {
        Self {
            repo,
            sets: Vec::new(),
            params: Vec::new(),
            clause: WhereClause::new(),
            fill_time: repo.options().fill_time,
        }
    }

    /// Set `field` to `value`, encoded the way the field is stored.
    pub fn set<T: FieldValue>(mut self, field: &str, value: T) -> Result<Self> {
        let set = R::field_set();
        let descriptor = set.get(field).ok_or_else(|| OrmError::UnknownField {
            entity: set.entity().to_string(),
            field: field.to_string(),
        })?;
        self.params.push(encode(descriptor, &value)?);
        self.sets.push(format!("{} = ?", quote_ident(field)));
        Ok(self)
    }

    /// Add a raw SET item such as `` `plays` = `plays` + 1 ``.
    ///
    /// Parameters it uses are added with [`push_params`](Self::push_params).
    pub fn set_sql(mut self, sql: &str) -> Self {
        self.sets.push(sql.to_string());
        self
    }

    /// Append parameters for raw SET items.
    pub fn push_params(mut self, params: impl IntoIterator<Item = SqlValue>) -> Self {
        self.params.extend(params);
        self
    }

    /// Override the repository's `fill_time` setting for this update.
    pub fn fill_time(mut self, enabled: bool) -> Self {
        self.fill_time = enabled;
        self
    }

    /// Build the statement and its parameters.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        if self.sets.is_empty() {
            return Err(OrmError::NoUpdateField);
        }
        if self.clause.is_empty() {
            return Err(OrmError::UnsafeUpdate);
        }

        let mut sets = self.sets.clone();
        let mut params = self.params.clone();
        if self.fill_time {
            if let Some(column) = self.updated_column() {
                sets.push(format!("{} = ?", quote_ident(column)));
                params.push(SqlValue::DateTime(chrono::Local::now().naive_local()));
            }
        }
        params.extend_from_slice(self.clause.params());

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(self.repo.table()),
            sets.join(", "),
            self.clause.sql()
        );
        Ok((sql, params))
    }

    /// The modification column, if the entity has one the caller did not
    /// set already.
    fn updated_column(&self) -> Option<&str> {
        self.repo
            .options()
            .updated_at
            .as_deref()
            .filter(|c| R::field_set().contains(c))
            .filter(|c| {
                let prefix = format!("{} =", quote_ident(c));
                !self.sets.iter().any(|s| s.starts_with(&prefix))
            })
    }

    /// Run the update and commit. Returns the number of affected rows.
    pub async fn execute(self) -> Result<u64> {
        let (sql, params) = self.build()?;
        let result = statement::write(self.repo.pool(), &sql, &params).await?;
        Ok(result.rows_affected)
    }
}

impl<R: Record> Filter for Update<'_, R> {
    fn where_clause(&mut self) -> &mut WhereClause {
        &mut self.clause
    }
}

impl<R: Record> std::fmt::Debug for Update<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update")
            .field("table", &self.repo.table())
            .field("sets", &self.sets)
            .field("where", &self.clause.sql())
            .finish_non_exhaustive()
    }
}
