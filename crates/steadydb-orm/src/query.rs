//! Single-table SELECT builder.

use serde_json::{Map, Value as Json};
use steadydb_client::Row;

use crate::error::{OrmError, Result};
use crate::field::{FieldSet, quote_ident};
use crate::filter::{Filter, WhereClause};
use crate::record::{Record, decode_row};
use crate::repository::Repository;
use crate::statement;
use crate::value::column_json;

/// A query over one repository's table.
///
/// Results come in three shapes: records (`get_list`), raw rows
/// (`get_list_rows`) and JSON objects keyed by field name
/// (`get_list_maps`). The `_as` variants decode into another record type,
/// selecting only the fields it shares with the entity.
///
/// A query is consumed by the call that runs it.
#[must_use]
pub struct Query<'r, R: Record> {
    repo: &'r Repository<R>,
    fields: Vec<usize>,
    clause: WhereClause,
    order: Option<String>,
}

impl<'r, R: Record> Query<'r, R> {
    pub(crate) fn new(repo: &'r Repository<R>) -> Self {
        Self {
            repo,
            fields: (0..R::field_set().len()).collect(),
            clause: WhereClause::new(),
            order: None,
        }
    }

    /// Restrict the selected columns to `names`, in that order.
    ///
    /// Fields left out keep their default value in decoded records.
    pub fn select(mut self, names: &[&str]) -> Result<Self> {
        let set = R::field_set();
        self.fields = names
            .iter()
            .map(|&name| {
                set.index_of(name).ok_or_else(|| OrmError::UnknownField {
                    entity: set.entity().to_string(),
                    field: name.to_string(),
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// Sort ascending by `field`. Replaces any earlier ordering.
    pub fn order(mut self, field: &str) -> Self {
        self.order = Some(format!("ORDER BY {}", quote_ident(field)));
        self
    }

    /// Sort descending by `field`, then by identity descending.
    /// Replaces any earlier ordering.
    pub fn order_desc(mut self, field: &str) -> Self {
        let identity = &self.repo.options().identity;
        self.order = Some(if field == identity.as_str() {
            format!("ORDER BY {} DESC", quote_ident(field))
        } else {
            format!(
                "ORDER BY {} DESC, {} DESC",
                quote_ident(field),
                quote_ident(identity)
            )
        });
        self
    }

    /// The SELECT statement this query runs, without a LIMIT.
    pub fn sql(&self) -> String {
        self.select_sql(&self.fields)
    }

    fn select_sql(&self, fields: &[usize]) -> String {
        let set = R::field_set();
        let columns: Vec<String> = fields
            .iter()
            .filter_map(|&i| set.field(i))
            .map(|f| quote_ident(f.name()))
            .collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_ident(self.repo.table())
        );
        self.clause.append_to(&mut sql);
        if let Some(order) = &self.order {
            sql.push(' ');
            sql.push_str(order);
        }
        sql
    }

    fn count_sql(&self) -> String {
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(self.repo.table()));
        self.clause.append_to(&mut sql);
        sql
    }

    async fn first_row(&self, fields: &[usize]) -> Result<Option<Row>> {
        let sql = format!("{} LIMIT 1", self.select_sql(fields));
        let rows = statement::fetch(self.repo.pool(), &sql, self.clause.params()).await?;
        Ok(rows.into_iter().next())
    }

    async fn all_rows(&self, fields: &[usize]) -> Result<Vec<Row>> {
        statement::fetch(self.repo.pool(), &self.select_sql(fields), self.clause.params()).await
    }

    async fn page_of_rows(&self, fields: &[usize], index: u64, size: u64) -> Result<(Vec<Row>, u64)> {
        statement::fetch_page(
            self.repo.pool(),
            &self.count_sql(),
            &self.select_sql(fields),
            self.clause.params(),
            index,
            size,
        )
        .await
    }

    /// First matching record.
    pub async fn get_first(self) -> Result<Option<R>> {
        let row = self.first_row(&self.fields).await?;
        Ok(row.map(|r| decode_row(&r, 0, &self.fields)).transpose()?)
    }

    /// Every matching record.
    pub async fn get_list(self) -> Result<Vec<R>> {
        let rows = self.all_rows(&self.fields).await?;
        decode_all(&rows, &self.fields)
    }

    /// One page of records and the total number of matches.
    ///
    /// `index` starts at 1.
    pub async fn page(self, index: u64, size: u64) -> Result<(Vec<R>, u64)> {
        let (rows, total) = self.page_of_rows(&self.fields, index, size).await?;
        Ok((decode_all(&rows, &self.fields)?, total))
    }

    /// Number of matching rows.
    pub async fn count(self) -> Result<u64> {
        statement::fetch_count(self.repo.pool(), &self.count_sql(), self.clause.params()).await
    }

    /// First matching row, undecoded.
    pub async fn get_first_row(self) -> Result<Option<Row>> {
        self.first_row(&self.fields).await
    }

    /// Every matching row, undecoded.
    pub async fn get_list_rows(self) -> Result<Vec<Row>> {
        self.all_rows(&self.fields).await
    }

    /// One page of undecoded rows and the total number of matches.
    pub async fn page_rows(self, index: u64, size: u64) -> Result<(Vec<Row>, u64)> {
        self.page_of_rows(&self.fields, index, size).await
    }

    /// First matching row as a JSON object keyed by field name.
    pub async fn get_first_map(self) -> Result<Option<Map<String, Json>>> {
        let row = self.first_row(&self.fields).await?;
        row.map(|r| to_map(R::field_set(), &r, &self.fields)).transpose()
    }

    /// Every matching row as a JSON object keyed by field name.
    pub async fn get_list_maps(self) -> Result<Vec<Map<String, Json>>> {
        let rows = self.all_rows(&self.fields).await?;
        rows.iter()
            .map(|r| to_map(R::field_set(), r, &self.fields))
            .collect()
    }

    /// One page of JSON objects and the total number of matches.
    pub async fn page_maps(self, index: u64, size: u64) -> Result<(Vec<Map<String, Json>>, u64)> {
        let (rows, total) = self.page_of_rows(&self.fields, index, size).await?;
        let maps = rows
            .iter()
            .map(|r| to_map(R::field_set(), r, &self.fields))
            .collect::<Result<_>>()?;
        Ok((maps, total))
    }

    /// First match decoded as `D`.
    pub async fn get_first_as<D: Record>(self) -> Result<Option<D>> {
        let (columns, targets) = projection::<R, D>();
        let row = self.first_row(&columns).await?;
        Ok(row.map(|r| decode_row(&r, 0, &targets)).transpose()?)
    }

    /// Every match decoded as `D`.
    pub async fn get_list_as<D: Record>(self) -> Result<Vec<D>> {
        let (columns, targets) = projection::<R, D>();
        let rows = self.all_rows(&columns).await?;
        decode_all(&rows, &targets)
    }

    /// One page decoded as `D` and the total number of matches.
    pub async fn page_as<D: Record>(self, index: u64, size: u64) -> Result<(Vec<D>, u64)> {
        let (columns, targets) = projection::<R, D>();
        let (rows, total) = self.page_of_rows(&columns, index, size).await?;
        Ok((decode_all(&rows, &targets)?, total))
    }
}

impl<R: Record> Filter for Query<'_, R> {
    fn where_clause(&mut self) -> &mut WhereClause {
        &mut self.clause
    }
}

impl<R: Record> std::fmt::Debug for Query<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql())
            .field("params", &self.clause.params())
            .finish()
    }
}

fn decode_all<D: Record>(rows: &[Row], fields: &[usize]) -> Result<Vec<D>> {
    Ok(rows
        .iter()
        .map(|r| decode_row(r, 0, fields))
        .collect::<std::result::Result<_, _>>()?)
}

fn to_map(set: &FieldSet, row: &Row, fields: &[usize]) -> Result<Map<String, Json>> {
    let mut map = Map::new();
    for (column, field) in fields.iter().filter_map(|&i| set.field(i)).enumerate() {
        let value = match row.value(column) {
            Some(value) => column_json(field, value)?,
            None => Json::Null,
        };
        map.insert(field.name().to_string(), value);
    }
    Ok(map)
}

/// Entity columns shared with `D`, paired with their indices in `D`.
fn projection<R: Record, D: Record>() -> (Vec<usize>, Vec<usize>) {
    let entity = R::field_set();
    D::field_set()
        .fields()
        .iter()
        .filter_map(|f| entity.index_of(f.name()).map(|i| (i, f.index())))
        .unzip()
}
