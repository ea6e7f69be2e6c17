//! WHERE clause construction.
//!
//! Predicates append a parenthesized fragment and are joined with `AND`.
//! [`Filter::or`] turns the joiner after the most recent fragment into
//! `OR`, so `eq(a).or().eq(b)` reads `(a) OR (b)`. It only ever affects
//! the pair of fragments around it; there is no grouping.

use std::fmt::Display;

use steadydb_client::SqlValue;

use crate::field::quote_ident;

const AND: &str = "AND";
const OR: &str = "OR";

/// Accumulated WHERE fragments and their parameters.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    // Fragments alternate with joiners; the last entry is always a joiner.
    parts: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereClause {
    /// Create an empty clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and its parameters.
    pub fn push(&mut self, fragment: impl Into<String>, params: impl IntoIterator<Item = SqlValue>) {
        self.parts.push(fragment.into());
        self.parts.push(AND.to_string());
        self.params.extend(params);
    }

    /// Join the most recent fragment to the next one with `OR`.
    pub fn set_or(&mut self) {
        if let Some(joiner) = self.parts.last_mut() {
            *joiner = OR.to_string();
        }
    }

    /// Whether no fragment was added.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The clause text, without the `WHERE` keyword.
    pub fn sql(&self) -> String {
        match self.parts.split_last() {
            Some((_, fragments)) => fragments.join(" "),
            None => String::new(),
        }
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Append ` WHERE <clause>` to `sql` if the clause is not empty.
    pub(crate) fn append_to(&self, sql: &mut String) {
        if !self.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.sql());
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Predicate methods shared by every builder with a WHERE clause.
pub trait Filter: Sized {
    /// The clause predicates are added to.
    fn where_clause(&mut self) -> &mut WhereClause;

    /// `field = value`
    #[must_use]
    fn eq(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, "=", value)
    }

    /// `field <> value`
    #[must_use]
    fn ne(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, "<>", value)
    }

    /// `field > value`
    #[must_use]
    fn gt(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, ">", value)
    }

    /// `field < value`
    #[must_use]
    fn lt(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, "<", value)
    }

    /// `field >= value`
    #[must_use]
    fn ge(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, ">=", value)
    }

    /// `field <= value`
    #[must_use]
    fn le(self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(field, "<=", value)
    }

    /// `field LIKE '%value%'`
    ///
    /// # Security
    ///
    /// The value is written into the SQL text, not bound as a parameter,
    /// so `%` and `_` keep their wildcard meaning. Never pass untrusted
    /// input without escaping quotes yourself.
    #[must_use]
    fn like(mut self, field: &str, value: impl Display) -> Self {
        self.where_clause()
            .push(format!("({} LIKE '%{value}%')", quote_ident(field)), []);
        self
    }

    /// `field IN (values...)`, one placeholder per value.
    ///
    /// An empty list matches nothing.
    #[must_use]
    fn in_list<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        let fragment = if values.is_empty() {
            "(1 = 0)".to_string()
        } else {
            format!("({} IN ({}))", quote_ident(field), placeholders(values.len()))
        };
        self.where_clause().push(fragment, values);
        self
    }

    /// Join the previous predicate to the next one with `OR` instead of
    /// `AND`.
    #[must_use]
    fn or(mut self) -> Self {
        self.where_clause().set_or();
        self
    }

    /// Append a raw fragment with its parameters.
    #[must_use]
    fn where_sql(mut self, sql: &str, params: impl IntoIterator<Item = SqlValue>) -> Self {
        self.where_clause().push(format!("({sql})"), params);
        self
    }

    /// Apply `f` only when `condition` holds.
    #[must_use]
    fn filter_if(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    #[doc(hidden)]
    fn compare(mut self, field: &str, op: &str, value: impl Into<SqlValue>) -> Self {
        self.where_clause()
            .push(format!("({} {op} ?)", quote_ident(field)), [value.into()]);
        self
    }
}

impl Filter for WhereClause {
    fn where_clause(&mut self) -> &mut WhereClause {
        self
    }
}
