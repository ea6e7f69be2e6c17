//! Test fixture utilities.

use std::io;

use tempfile::TempDir;

use crate::sqlite::SqliteCreator;

/// Database schema fixture for setting up and tearing down test tables.
#[derive(Debug, Clone, Default)]
pub struct TestFixture {
    /// Tables created by this fixture, as `(name, column definitions)`.
    pub tables: Vec<(String, String)>,
}

impl TestFixture {
    /// Create an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with its column definitions.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, columns: impl Into<String>) -> Self {
        self.tables.push((name.into(), columns.into()));
        self
    }

    /// Statements creating every table, in declaration order.
    #[must_use]
    pub fn create_sql(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|(name, columns)| format!("CREATE TABLE IF NOT EXISTS {name} ({columns})"))
            .collect()
    }

    /// Statements dropping every table, in reverse declaration order.
    #[must_use]
    pub fn drop_sql(&self) -> Vec<String> {
        self.tables
            .iter()
            .rev()
            .map(|(name, _)| format!("DROP TABLE IF EXISTS {name}"))
            .collect()
    }
}

/// A SQLite database in a temporary directory.
///
/// The directory, and the database with it, is removed on drop.
#[derive(Debug)]
pub struct TempDatabase {
    dir: TempDir,
    creator: SqliteCreator,
}

impl TempDatabase {
    /// Create a fresh database file.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let creator = SqliteCreator::new(dir.path().join("steadydb-test.db"));
        Ok(Self { dir, creator })
    }

    /// Creator opening connections to this database.
    #[must_use]
    pub fn creator(&self) -> SqliteCreator {
        self.creator.clone()
    }

    /// Directory holding the database file.
    #[must_use]
    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}
