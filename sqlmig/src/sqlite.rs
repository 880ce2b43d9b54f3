//! # SQLite driver
//!
//! [SqliteDatabase] implements [Database] on top of [`rusqlite`](https://crates.io/crates/rusqlite).
//!
//! SQLite has no `CREATE SCHEMA`. A schema is an attached database instead: when the history
//! schema is not yet attached, it is attached from `<schema>.db` next to the main database file,
//! or as an in-memory database when the main database is itself in memory.
//!
//! SQLite fully supports transactional DDL, so a failing migration script is rolled back completely.
//!
//! ## Example
//!
//! ```
//! use sqlmig::sqlite::SqliteDatabase;
//! use sqlmig::{Settings, SqlMigrator};
//!
//! # fn main() -> Result<(), sqlmig::Error> {
//! let dir = tempfile::tempdir().unwrap();
//! let settings = Settings::new("migration", "history", dir.path())?;
//! let mut migrator = SqlMigrator::try_new(SqliteDatabase::open_in_memory()?, settings)?;
//! let report = migrator.up(0)?;
//! assert!(report.is_empty());
//! # Ok(())
//! # }
//! ```

use crate::database::{Database, Row, Value};
use crate::error::Error;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A [Database] backed by a single SQLite connection.
#[derive(Debug)]
pub struct SqliteDatabase {
    conn: Option<Connection>,
    attach_dir: Option<PathBuf>,
}

impl SqliteDatabase {
    /// Open (or create) the database file at `path`. `:memory:` opens an in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        let conn = Connection::open(path)?;
        Self::with_attach_dir(conn, path.parent().map(Path::to_path_buf))
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        Self::with_attach_dir(Connection::open_in_memory()?, None)
    }

    /// Wrap an existing connection. Schemas that are not attached yet are attached in memory.
    pub fn from_connection(conn: Connection) -> Result<Self, Error> {
        Self::with_attach_dir(conn, None)
    }

    fn with_attach_dir(conn: Connection, attach_dir: Option<PathBuf>) -> Result<Self, Error> {
        let database = Self {
            conn: Some(conn),
            attach_dir,
        };
        database.with_busy_timeout(Duration::from_secs(30))
    }

    /// Set how long a statement waits on a locked database before failing.
    /// Defaults to 30 seconds, so that a second process waits instead of failing immediately.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self, Error> {
        self.connection()?.busy_timeout(timeout)?;
        Ok(self)
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> Result<&Connection, Error> {
        self.conn.as_ref().ok_or(Error::ConnectionClosed)
    }

    fn attached_schemas(&self) -> Result<Vec<String>, Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("PRAGMA database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(v) => rusqlite::types::Value::Integer(*v),
        Value::Real(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Blob(v) => rusqlite::types::Value::Blob(v.clone()),
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

impl Database for SqliteDatabase {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), Error> {
        let conn = self.connection()?;
        if params.is_empty() {
            conn.execute_batch(sql)?;
        } else {
            conn.execute(sql, rusqlite::params_from_iter(params.iter().map(to_sql_value)))?;
        }
        Ok(())
    }

    fn query_all(&mut self, sql: &str) -> Result<Vec<Row>, Error> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let rows = stmt
            .query_map([], |row| {
                let mut columns = Vec::with_capacity(names.len());
                for (index, name) in names.iter().enumerate() {
                    columns.push((name.clone(), from_value_ref(row.get_ref(index)?)));
                }
                Ok(Row::new(columns))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn begin_transaction(&mut self) -> Result<(), Error> {
        self.connection()?.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Error> {
        self.connection()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), Error> {
        let conn = self.connection()?;
        // a failed COMMIT may already have ended the transaction
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close_connection(&mut self) -> Result<(), Error> {
        if let Some(conn) = self.conn.take() {
            if let Err((conn, error)) = conn.close() {
                self.conn = Some(conn);
                return Err(error.into());
            }
        }
        Ok(())
    }

    fn ensure_schema(&mut self, schema: &str) -> Result<(), Error> {
        if self.attached_schemas()?.iter().any(|name| name == schema) {
            return Ok(());
        }
        let file = match &self.attach_dir {
            Some(dir) => dir.join(format!("{}.db", schema)).to_string_lossy().into_owned(),
            None => ":memory:".to_string(),
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(schema = schema, file = %file, "Attaching SQLite schema");
        self.connection()?
            .execute(&format!("ATTACH DATABASE ?1 AS {}", schema), [file])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_batch_and_query() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, label TEXT); INSERT INTO t (label) VALUES ('a');",
            &[],
        )
        .unwrap();
        db.execute("INSERT INTO t (label) VALUES ($1)", &[Value::from("b")])
            .unwrap();
        let rows = db.query_all("SELECT id, label FROM t ORDER BY id").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_i64("id").unwrap(), 1);
        assert_eq!(rows[1].get_text("label").unwrap(), "b");
    }

    #[test]
    fn rollback_discards_changes() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[]).unwrap();
        db.begin_transaction().unwrap();
        db.execute("INSERT INTO t (id) VALUES (1)", &[]).unwrap();
        db.rollback().unwrap();
        assert!(db.query_all("SELECT id FROM t").unwrap().is_empty());
        // rolling back outside a transaction is harmless
        db.rollback().unwrap();
    }

    #[test]
    fn ensure_schema_attaches_once() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.ensure_schema("migration").unwrap();
        db.ensure_schema("migration").unwrap();
        db.execute("CREATE TABLE migration.t (id INTEGER)", &[]).unwrap();
        assert!(db.attached_schemas().unwrap().contains(&"migration".to_string()));
        // main is always present
        db.ensure_schema("main").unwrap();
    }

    #[test]
    fn ensure_schema_creates_file_next_to_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = SqliteDatabase::open(dir.path().join("app.db")).unwrap();
        db.ensure_schema("migration").unwrap();
        db.execute("CREATE TABLE migration.t (id INTEGER)", &[]).unwrap();
        assert!(dir.path().join("migration.db").exists());
    }

    #[test]
    fn memory_path_attaches_schemas_in_memory() {
        let mut db = SqliteDatabase::open(":memory:").unwrap();
        assert_eq!(db.attach_dir, None);
        db.ensure_schema("migration").unwrap();
        db.execute("CREATE TABLE migration.t (id INTEGER)", &[]).unwrap();
        // no migration.db next to the working directory
        assert!(!Path::new("migration.db").exists());
    }

    #[test]
    fn wraps_an_existing_connection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t (id) VALUES (3);")
            .unwrap();
        let mut db = SqliteDatabase::from_connection(conn).unwrap();
        assert_eq!(db.attach_dir, None);
        let rows = db.query_all("SELECT id FROM t").unwrap();
        assert_eq!(rows[0].get_i64("id").unwrap(), 3);
    }

    #[test]
    fn close_is_idempotent() {
        let mut db = SqliteDatabase::open_in_memory().unwrap();
        db.close_connection().unwrap();
        db.close_connection().unwrap();
        assert_eq!(db.execute("SELECT 1", &[]), Err(Error::ConnectionClosed));
    }
}
