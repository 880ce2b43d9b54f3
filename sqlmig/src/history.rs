use crate::database::{Database, Value};
use crate::error::Error;
use crate::settings::Settings;
use chrono::{DateTime, Utc};

/// A migration that has been applied to the database and not reverted since.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    /// The name of the migration.
    pub name: String,
    /// When the migration was applied, in epoch seconds. `None` for rows written without a time.
    pub applied_at: Option<i64>,
}

impl HistoryRecord {
    /// The application time as a UTC timestamp, if it is known and in range.
    pub fn applied_at_utc(&self) -> Option<DateTime<Utc>> {
        self.applied_at
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
    }
}

/// Reads and writes the history table `{schema}.{table}`.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    schema: String,
    table: String,
}

impl HistoryStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            schema: settings.schema().to_string(),
            table: settings.table().to_string(),
        }
    }

    fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Create the schema and the history table if they are missing.
    pub fn ensure_schema(&self, db: &mut dyn Database) -> Result<(), Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.qualified_table(), "Ensuring migration history table");

        db.ensure_schema(&self.schema)
            .map_err(|source| Error::SchemaInit {
                object: format!("schema {}", self.schema),
                source: Box::new(source),
            })?;
        db.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    name VARCHAR(180) NOT NULL,
                    apply_time BIGINT,
                    CONSTRAINT {}_pk PRIMARY KEY (name)
                )",
                self.qualified_table(),
                self.table
            ),
            &[],
        )
        .map_err(|source| Error::SchemaInit {
            object: format!("table {}", self.qualified_table()),
            source: Box::new(source),
        })
    }

    /// Applied migrations, most recent first. A `limit` of zero returns all of them.
    /// Rows without an apply time sort as the oldest.
    pub fn list_applied(
        &self,
        db: &mut dyn Database,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, Error> {
        let limit_sql = if limit == 0 {
            String::new()
        } else {
            format!(" LIMIT {}", limit)
        };
        let rows = db.query_all(&format!(
            "SELECT name, apply_time FROM {} ORDER BY COALESCE(apply_time, 0) DESC, name DESC{}",
            self.qualified_table(),
            limit_sql
        ))?;
        rows.iter()
            .map(|row| {
                Ok(HistoryRecord {
                    name: row.get_text("name")?.to_string(),
                    applied_at: row.get_opt_i64("apply_time")?,
                })
            })
            .collect()
    }

    pub fn record_applied(&self, db: &mut dyn Database, name: &str) -> Result<(), Error> {
        db.execute(
            &format!(
                "INSERT INTO {} (name, apply_time) VALUES ($1, $2)",
                self.qualified_table()
            ),
            &[Value::from(name), Value::from(Utc::now().timestamp())],
        )
        .map_err(|source| Error::HistoryWrite {
            migration: name.to_string(),
            source: Box::new(source),
        })
    }

    pub fn record_reverted(&self, db: &mut dyn Database, name: &str) -> Result<(), Error> {
        db.execute(
            &format!("DELETE FROM {} WHERE name = $1", self.qualified_table()),
            &[Value::from(name)],
        )
        .map_err(|source| Error::HistoryWrite {
            migration: name.to_string(),
            source: Box::new(source),
        })
    }
}
