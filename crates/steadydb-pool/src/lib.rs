//! # steadydb-pool
//!
//! Connection pool built on steady connections.
//!
//! Connections are either dedicated to one user or shared between several
//! when the driver is thread-safe at the connection level. Returned
//! connections are rolled back and kept in a bounded idle cache.
//!
//! ## Features
//!
//! - Idle cache with `min_cached` warm-up and `max_cached` bound
//! - Shared connections, never handed to new owners mid-transaction
//! - `max_connections` ceiling that either fails fast or blocks
//! - Reconnects on transient failures through [`SteadyConnection`]
//! - `close_all` without shutting the pool down
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadydb_pool::Pool;
//!
//! let pool = Pool::builder()
//!     .creator(creator)
//!     .min_cached(2)
//!     .max_cached(10)
//!     .max_connections(20)
//!     .blocking(true)
//!     .build()
//!     .await?;
//!
//! let mut conn = pool.dedicated_connection().await?;
//! conn.execute("UPDATE counters SET n = n + 1", &[]).await?;
//! // Connection automatically returned to pool on drop
//! ```
//!
//! [`SteadyConnection`]: steadydb_client::SteadyConnection

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::{PoolConfig, ResetPolicy};
pub use connection::PoolConnection;
pub use error::PoolError;
pub use lifecycle::ConnectionLifecycle;
pub use pool::{Pool, PoolBuilder, PoolStatus};
