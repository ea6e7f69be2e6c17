//! Row representation for query results.
//!
//! Rows of one result set share their column metadata through an
//! `Arc<ColMetaData>`; only the values are owned per row.

use std::collections::BTreeMap;
use std::sync::Arc;

use steadydb_types::{FromSql, SqlValue, TypeError};

/// Column metadata describing a result set column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name as reported by the driver.
    pub name: String,
    /// Column index (0-based).
    pub index: usize,
    /// Declared SQL type, if the driver knows it.
    pub type_name: Option<String>,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            type_name: None,
        }
    }

    /// Set the declared type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

/// Column metadata shared by all rows of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColMetaData {
    /// Column definitions.
    pub columns: Arc<[Column]>,
}

impl ColMetaData {
    /// Create metadata from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Create metadata from column names, in order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .enumerate()
                .map(|(i, n)| Column::new(n, i))
                .collect(),
        )
    }

    /// Get the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Find a column index by name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A row from a query result.
#[derive(Clone, PartialEq)]
pub struct Row {
    metadata: Arc<ColMetaData>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Create a row. Missing trailing values read as NULL.
    pub fn new(metadata: Arc<ColMetaData>, values: Vec<SqlValue>) -> Self {
        Self { metadata, values }
    }

    /// Get a value by column index with type conversion.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column index",
                actual: format!("index {index} out of bounds"),
            })
            .and_then(T::from_sql)
    }

    /// Get a value by column name with type conversion.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .metadata
            .find_by_name(name)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column name",
                actual: format!("column '{name}' not found"),
            })?;
        self.get(index)
    }

    /// Try to get a value by column index, returning None if NULL or not found.
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Borrow the raw value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Get the raw SQL value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<SqlValue> {
        let index = self.metadata.find_by_name(name)?;
        self.values.get(index).cloned()
    }

    /// All values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Consume the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Convert the row into a column-name keyed map.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, SqlValue> {
        self.metadata
            .columns
            .iter()
            .map(|c| c.name.clone())
            .zip(self.values)
            .collect()
    }

    /// Number of values in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.metadata.columns
    }

    /// Shared metadata handle.
    #[must_use]
    pub fn metadata(&self) -> &Arc<ColMetaData> {
        &self.metadata
    }

    /// Check if the value at `index` is NULL or missing.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(SqlValue::is_null)
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.metadata
                    .columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .zip(self.values.iter()),
            )
            .finish()
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata; empty for statements that return no rows.
    pub metadata: Arc<ColMetaData>,
    /// Returned rows.
    pub rows: Vec<Row>,
    /// Rows affected by a write.
    pub rows_affected: u64,
    /// Identity value generated by an insert, if any.
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    /// A result for a statement that produced no rows.
    #[must_use]
    pub fn affected(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            ..Self::default()
        }
    }

    /// A result carrying rows.
    #[must_use]
    pub fn with_rows(metadata: Arc<ColMetaData>, rows: Vec<Vec<SqlValue>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&metadata), values))
            .collect();
        Self {
            metadata,
            rows,
            rows_affected: 0,
            last_insert_id: None,
        }
    }

    /// Whether the statement produced a result set.
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        !self.metadata.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Row {
        let meta = Arc::new(ColMetaData::from_names(["id", "Name"]));
        Row::new(meta, vec![SqlValue::BigInt(3), SqlValue::Text("ann".into())])
    }

    #[test]
    fn test_get_by_name_is_case_insensitive() {
        let row = sample();
        assert_eq!(row.get_by_name::<String>("name").unwrap(), "ann");
        assert_eq!(row.get::<i32>(0).unwrap(), 3);
        assert!(row.get::<i32>(5).is_err());
    }

    #[test]
    fn test_into_map() {
        let map = sample().into_map();
        assert_eq!(map.get("id"), Some(&SqlValue::BigInt(3)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_is_null_for_missing_index() {
        let row = sample();
        assert!(!row.is_null(0));
        assert!(row.is_null(9));
    }
}
