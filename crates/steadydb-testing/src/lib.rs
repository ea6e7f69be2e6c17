//! # steadydb-testing
//!
//! Test infrastructure for steadydb.
//!
//! ## Features
//!
//! - [`MockCreator`]: scripted driver with failure injection and counters
//! - [`SqliteCreator`]: real SQL over the bundled SQLite engine
//! - [`TempDatabase`] and [`TestFixture`] for throwaway schemas
//! - [`init_tracing`] to see library logs while a test runs
//!
//! ## Mock Driver Example
//!
//! ```rust,ignore
//! use steadydb_testing::{MockCreator, MockResponse};
//! use steadydb_client::ErrorKind;
//!
//! #[tokio::test]
//! async fn test_reconnect() {
//!     let creator = MockCreator::builder()
//!         .with_response("SELECT 1", MockResponse::scalar(1i64))
//!         .build();
//!     creator.sever_all();
//!     creator.fail_next_execute(ErrorKind::Operational);
//!     // hand creator to a pool or steady connection...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock;
pub mod sqlite;

pub use fixtures::{TempDatabase, TestFixture};
pub use mock::{MockConnection, MockCreator, MockCreatorBuilder, MockResponse, MockStats};
pub use sqlite::{SqliteConnection, SqliteCreator};

/// Install a test subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
