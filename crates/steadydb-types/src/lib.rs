//! # steadydb-types
//!
//! SQL value model shared by the driver contracts, the pool and the
//! repository layer.
//!
//! Drivers hand rows back as [`SqlValue`]s and accept parameters as
//! [`SqlValue`]s. [`FromSql`] and [`ToSql`] convert between those values
//! and ordinary Rust types.
//!
//! ## Type Mappings
//!
//! | SQL Type | Rust Type |
//! |----------|-----------|
//! | `BOOLEAN` | `bool` |
//! | `INTEGER` | `i32` |
//! | `BIGINT` | `i64` |
//! | `DOUBLE` | `f64` |
//! | `TEXT` | `String` |
//! | `BLOB` | `Vec<u8>` / `bytes::Bytes` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `TIME` | `chrono::NaiveTime` |
//! | `DATETIME` | `chrono::NaiveDateTime` |
//! | `JSON` | `serde_json::Value` |
//!
//! Text is accepted wherever a date, time or number is expected, because
//! several engines store those as strings.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_sql;
pub mod to_sql;
pub mod value;

pub use error::TypeError;
pub use from_sql::FromSql;
pub use to_sql::ToSql;
pub use value::{DATETIME_FORMAT, SqlValue, parse_date, parse_datetime, parse_time};
