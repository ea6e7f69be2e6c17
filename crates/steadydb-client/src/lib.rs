//! # steadydb-client
//!
//! Driver contracts and the self-healing [`SteadyConnection`].
//!
//! A driver plugs in by implementing [`Creator`] and [`RawConnection`].
//! Every error it raises carries an [`ErrorKind`]; a steady connection
//! matches that tag against its [`FailureSet`] to decide whether a failure
//! is transient (reconnect and retry) or must reach the caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use steadydb_client::{SteadyConfig, SteadyConnection, PingPolicy};
//!
//! let config = SteadyConfig::new()
//!     .max_usage(1000)
//!     .set_session(["SET time_zone = '+00:00'"])
//!     .ping(PingPolicy::ON_QUERY);
//!
//! let mut conn = SteadyConnection::open(creator, Arc::new(config)).await?;
//! let mut cursor = conn.cursor().await;
//! cursor.execute("SELECT id, name FROM users WHERE id = ?", &[1.into()]).await?;
//! let row = cursor.fetch_one()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod row;
pub mod steady;

pub use config::{FailureSet, PingPolicy, SteadyConfig};
pub use cursor::{ConnRef, Cursor};
pub use driver::{Creator, RawConnection, ThreadSafety};
pub use error::{Error, ErrorKind, Result};
pub use row::{ColMetaData, Column, QueryResult, Row};
pub use steady::{ConnectionMetadata, SteadyConnection};
pub use steadydb_types::{DATETIME_FORMAT, FromSql, SqlValue, ToSql, TypeError};
