#![cfg_attr(docsrs, feature(doc_cfg))]
//! `sqlmig` runs plain SQL migrations kept in a directory tree, and records each applied
//! migration in a history table.
//!
//! # Layout
//!
//! Each migration is a directory named `m{YYYYMMDD}_{HHMMSS}_{label}` under a root path,
//! holding an `up.sql` and a `down.sql` script. The timestamp must be a real calendar date and
//! time: a directory such as `m20241305_000000_x` is skipped, with a warning when the `tracing`
//! feature is enabled. Either script may be empty, meaning "nothing to do". Names sort
//! chronologically, and that order is the only order: there is no dependency graph between
//! migrations.
//!
//! ```text
//! migrations/
//!   m20240305_143000_add_users/
//!     up.sql
//!     down.sql
//!   m20240306_090000_add_orders/
//!     up.sql
//!     down.sql
//! ```
//!
//! # Running
//!
//! A [SqlMigrator] owns a [Database] connection and [Settings] naming the history schema, the
//! history table and the migrations path.
//!
//! - [`up(n)`](SqlMigrator::up) applies the `n` oldest pending migrations (all when `n == 0`).
//! - [`down(n)`](SqlMigrator::down) reverts the `n` most recently applied ones (all when `n == 0`).
//! - [`history(n)`](SqlMigrator::history) lists what has been applied, newest first.
//! - [`create(name)`](SqlMigrator::create) scaffolds a new migration with empty scripts.
//!
//! Every script runs in its own transaction. A run stops at the first migration that fails,
//! and the returned [MigrationReport] says which migrations completed and which one failed.
//! History therefore never skips ahead of the real schema state.
//!
//! ```
//! use sqlmig::sqlite::SqliteDatabase;
//! use sqlmig::{Settings, SqlMigrator};
//!
//! # fn main() -> Result<(), sqlmig::Error> {
//! let dir = tempfile::tempdir().unwrap();
//! let settings = Settings::new("migration", "history", dir.path())?;
//! let mut migrator = SqlMigrator::try_new(SqliteDatabase::open_in_memory()?, settings)?;
//!
//! let unit = migrator.create("add_users")?;
//! std::fs::write(unit.path().join("up.sql"), "CREATE TABLE users (id INTEGER PRIMARY KEY);").unwrap();
//! std::fs::write(unit.path().join("down.sql"), "DROP TABLE users;").unwrap();
//!
//! let report = migrator.up(0)?;
//! assert_eq!(report.succeeded_names(), vec![unit.name()]);
//! assert!(report.failed.is_none());
//!
//! let report = migrator.down(1)?;
//! assert_eq!(report.succeeded.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `sqlite` (default) - [`SqliteDatabase`](sqlite::SqliteDatabase) via `rusqlite`.
//! - `postgres` - [`PostgresDatabase`](postgres::PostgresDatabase) via `postgres`.
//! - `tracing` - emit spans and events for each migration.
//! - `testing` - a [`TestHarness`](testing::TestHarness) for exercising migrations in tests.

mod author;
pub use author::MigrationAuthor;

mod core;
pub use core::{Direction, MigrationFailure, MigrationReport};

mod database;
pub use database::{Database, Row, Value};

mod error;
pub use error::Error;

mod history;
pub use history::{HistoryRecord, HistoryStore};

mod migrator;
pub use migrator::SqlMigrator;

mod repository;
pub use repository::{parse_unit_name, MigrationRepository, MigrationUnit};

mod settings;
pub use settings::Settings;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(all(any(test, feature = "testing"), feature = "sqlite"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
