//! The database capability consumed by the migrator.
//!
//! Any driver can back a [SqlMigrator](crate::SqlMigrator) by implementing [Database].
//! Drivers for SQLite and PostgreSQL ship behind the `sqlite` and `postgres` features.

use crate::error::Error;

/// A single SQL value, either bound as a parameter or read back from a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One result row: column names paired with values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Look up a column by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Read a text column, failing if it is absent or not text.
    pub fn get_text(&self, column: &str) -> Result<&str, Error> {
        match self.get(column) {
            Some(Value::Text(text)) => Ok(text),
            other => Err(Error::Generic(format!(
                "expected text in column '{}', found {:?}",
                column, other
            ))),
        }
    }

    /// Read an integer column, failing if it is absent or not an integer.
    pub fn get_i64(&self, column: &str) -> Result<i64, Error> {
        match self.get(column) {
            Some(Value::Integer(value)) => Ok(*value),
            other => Err(Error::Generic(format!(
                "expected integer in column '{}', found {:?}",
                column, other
            ))),
        }
    }

    /// Read a nullable integer column. SQL NULL is `None`.
    pub fn get_opt_i64(&self, column: &str) -> Result<Option<i64>, Error> {
        match self.get(column) {
            Some(Value::Null) => Ok(None),
            _ => self.get_i64(column).map(Some),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }
}

/// A live connection the migrator drives.
///
/// Parameters passed to [Database::execute] are bound positionally to `$1, $2, ...`.
/// When no parameters are given, `sql` may contain several statements and must be
/// executed as a batch: migration scripts are passed through untouched.
pub trait Database {
    /// Run a statement (or a batch of statements when `params` is empty).
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), Error>;

    /// Run a query and collect every row.
    fn query_all(&mut self, sql: &str) -> Result<Vec<Row>, Error>;

    fn begin_transaction(&mut self) -> Result<(), Error>;

    fn commit(&mut self) -> Result<(), Error>;

    /// Abandon the open transaction, leaving the connection as it was before `begin_transaction`.
    fn rollback(&mut self) -> Result<(), Error>;

    /// Release the connection. Calling this more than once is a no-op.
    fn close_connection(&mut self) -> Result<(), Error>;

    /// Make sure `schema` exists. The default issues `CREATE SCHEMA IF NOT EXISTS`.
    fn ensure_schema(&mut self, schema: &str) -> Result<(), Error> {
        self.execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
    }
}

impl<D: Database + ?Sized> Database for Box<D> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<(), Error> {
        (**self).execute(sql, params)
    }

    fn query_all(&mut self, sql: &str) -> Result<Vec<Row>, Error> {
        (**self).query_all(sql)
    }

    fn begin_transaction(&mut self) -> Result<(), Error> {
        (**self).begin_transaction()
    }

    fn commit(&mut self) -> Result<(), Error> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), Error> {
        (**self).rollback()
    }

    fn close_connection(&mut self) -> Result<(), Error> {
        (**self).close_connection()
    }

    fn ensure_schema(&mut self, schema: &str) -> Result<(), Error> {
        (**self).ensure_schema(schema)
    }
}
