//! # steadydb-orm
//!
//! Records, query builders and repositories on top of [`steadydb_pool`].
//!
//! A [`Record`] is a struct whose fields are registered once as a
//! [`FieldSet`]. A [`Repository`] binds a record type to a table and a
//! pool handle, and hands out single-use [`Query`] and [`Update`]
//! builders. [`JoinRepository`] reads tuples of records through a fixed
//! LEFT JOIN.
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadydb_orm::prelude::*;
//! use steadydb_orm::Repository;
//!
//! #[derive(Record, Default)]
//! struct Song {
//!     id: Option<i64>,
//!     #[record(required)]
//!     title: String,
//!     #[record(map_json)]
//!     tags: Vec<String>,
//! }
//!
//! let songs = Repository::<Song>::new(pool.clone(), "song");
//!
//! let mut song = Song { title: "Blue".into(), ..Default::default() };
//! songs.insert(&mut song).await?;
//!
//! let (page, total) = songs
//!     .query()
//!     .like("title", "Bl")
//!     .order_desc("id")
//!     .page(1, 20)
//!     .await?;
//!
//! songs.update().set("title", "Blue II".to_string())?.eq("id", 1i64).execute().await?;
//! ```
//!
//! ## Statements
//!
//! Placeholders are `?` and identifiers are quoted with backticks, which
//! MySQL and SQLite both accept. Reads run on shareable pool connections;
//! writes run on a dedicated connection and are committed immediately.

#![warn(missing_docs)]
#![deny(unsafe_code)]

// Lets `#[derive(Record)]` refer to this crate by name from inside it.
extern crate self as steadydb_orm;

pub mod error;
pub mod field;
pub mod filter;
pub mod join;
pub mod query;
pub mod record;
pub mod repository;
mod statement;
pub mod update;
pub mod value;

pub use error::{FieldError, OrmError, Result};
pub use field::{FieldDescriptor, FieldSet, FieldSetBuilder, FieldType};
pub use filter::{Filter, WhereClause};
pub use join::{JoinItem, JoinQuery, JoinRecord, JoinRepository};
pub use query::Query;
pub use record::Record;
pub use repository::{Repository, RepositoryOptions};
pub use update::Update;
pub use value::{FieldValue, JsonField};

/// Derive [`Record`] for a struct with named fields.
///
/// Field attributes:
///
/// - `#[record(rename = "col")]` column name (the alias follows it)
/// - `#[record(alias = "key")]` key in input and output maps
/// - `#[record(required)]` reject input maps without a value
/// - `#[record(default = <literal>)]` value for missing input
/// - `#[record(map_json)]` store as JSON text
/// - `#[record(skip)]` not a column; left at its default
///
/// The struct must implement `Default`.
#[cfg(feature = "derive")]
pub use steadydb_derive::Record;

/// Items used by code generated by `#[derive(Record)]`.
#[doc(hidden)]
pub mod __private {
    pub use serde_json;
    pub use steadydb_client::SqlValue;
}

/// Traits needed to build and run queries.
pub mod prelude {
    pub use crate::Record;
    pub use crate::filter::Filter;
    pub use crate::value::FieldValue;
}
