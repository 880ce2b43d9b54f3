//! Testing utilities for migration development.
//!
//! [TestHarness] pairs a temporary migrations directory with an in-memory SQLite
//! [SqlMigrator], so a test can write migrations, run them and inspect the result.
//!
//! # Example
//!
//! ```
//! use sqlmig::testing::TestHarness;
//!
//! let mut harness = TestHarness::new().unwrap();
//! harness.add_migration(
//!     "m20240101_000000_users",
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
//!     "DROP TABLE users;",
//! );
//!
//! harness.migrator().up(0).unwrap();
//! assert!(harness.table_exists("users").unwrap());
//! assert_eq!(harness.applied_names().unwrap(), vec!["m20240101_000000_users"]);
//!
//! harness.migrator().down(0).unwrap();
//! assert!(!harness.table_exists("users").unwrap());
//! ```

use crate::database::Database;
use crate::error::Error;
use crate::settings::Settings;
use crate::sqlite::SqliteDatabase;
use crate::SqlMigrator;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Schema holding the history table in harness databases.
pub const HISTORY_SCHEMA: &str = "migration";
/// History table in harness databases.
pub const HISTORY_TABLE: &str = "history";

/// A temporary migrations directory plus an in-memory SQLite migrator pointed at it.
pub struct TestHarness {
    dir: TempDir,
    migrator: SqlMigrator<SqliteDatabase>,
}

impl TestHarness {
    pub fn new() -> Result<Self, Error> {
        let dir = tempfile::tempdir().map_err(|e| Error::Generic(e.to_string()))?;
        let settings = Settings::new(HISTORY_SCHEMA, HISTORY_TABLE, dir.path())?;
        let migrator = SqlMigrator::try_new(SqliteDatabase::open_in_memory()?, settings)?;
        Ok(Self { dir, migrator })
    }

    /// Root of the migrations directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn migrator(&mut self) -> &mut SqlMigrator<SqliteDatabase> {
        &mut self.migrator
    }

    /// Write a migration directory with the given scripts. Panics on I/O errors.
    pub fn add_migration(&self, name: &str, up: &str, down: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("failed to create migration directory");
        std::fs::write(path.join("up.sql"), up).expect("failed to write up.sql");
        std::fs::write(path.join("down.sql"), down).expect("failed to write down.sql");
        path
    }

    /// Run SQL directly against the harness database.
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.migrator.database_mut().execute(sql, &[])
    }

    /// Names recorded in the history table, most recent first.
    pub fn applied_names(&mut self) -> Result<Vec<String>, Error> {
        Ok(self
            .migrator
            .applied(0)?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    /// Whether a table exists in the main schema.
    pub fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let conn = self.migrator.database_mut().connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Number of rows in a table.
    pub fn row_count(&mut self, table: &str) -> Result<i64, Error> {
        let conn = self.migrator.database_mut().connection()?;
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspects_the_harness_database() {
        let mut harness = TestHarness::new().unwrap();
        harness.add_migration(
            "m20240101_000000_seed",
            "CREATE TABLE users (id INTEGER PRIMARY KEY); INSERT INTO users (id) VALUES (1), (2);",
            "DROP TABLE users;",
        );
        assert!(!harness.table_exists("users").unwrap());

        harness.migrator().up(0).unwrap();
        assert_eq!(harness.row_count("users").unwrap(), 2);
        harness.execute("INSERT INTO users (id) VALUES (3)").unwrap();
        assert_eq!(harness.row_count("users").unwrap(), 3);
        assert_eq!(harness.row_count("migration.history").unwrap(), 1);
    }
}
