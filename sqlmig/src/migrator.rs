use crate::author::MigrationAuthor;
use crate::core::{Direction, MigrationFailure, MigrationReport};
use crate::database::Database;
use crate::error::Error;
use crate::history::{HistoryRecord, HistoryStore};
use crate::repository::{MigrationRepository, MigrationUnit};
use crate::settings::Settings;
use std::collections::HashSet;
use std::time::{Duration, Instant};

type StartHook = Box<dyn Fn(Direction, &str) + Send + Sync>;
type CompleteHook = Box<dyn Fn(Direction, &str, Duration) + Send + Sync>;
type ErrorHook = Box<dyn Fn(Direction, &str, &Error) + Send + Sync>;

/// The entrypoint for applying and reverting directory-based migrations.
///
/// The migrator owns its database connection and closes it when dropped.
/// Every migration script runs in its own transaction, and a run stops at the first
/// migration that fails: the failure is reported in [MigrationReport::failed] rather
/// than returned as an error, so the caller always learns what was applied before it.
pub struct SqlMigrator<D: Database> {
    database: D,
    settings: Settings,
    history: HistoryStore,
    repository: MigrationRepository,
    on_migration_start: Option<StartHook>,
    on_migration_complete: Option<CompleteHook>,
    on_migration_error: Option<ErrorHook>,
}

// Manual Debug impl since closures don't implement Debug
impl<D: Database + std::fmt::Debug> std::fmt::Debug for SqlMigrator<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlMigrator")
            .field("database", &self.database)
            .field("settings", &self.settings)
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish()
    }
}

impl<D: Database> SqlMigrator<D> {
    /// Create a migrator, creating the history schema and table if needed.
    /// Fails if the history table cannot be created; no migrator exists in that case.
    pub fn try_new(mut database: D, settings: Settings) -> Result<Self, Error> {
        let history = HistoryStore::new(&settings);
        history.ensure_schema(&mut database)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            table = %settings.qualified_table(),
            path = %settings.path().display(),
            "Migration history ready"
        );

        Ok(Self {
            repository: MigrationRepository::new(settings.path()),
            database,
            settings,
            history,
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_error: None,
        })
    }

    /// Set a callback to be invoked when a migration starts.
    /// The callback receives the direction and the migration name.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(Direction, &str) + Send + Sync + 'static,
    {
        self.on_migration_start = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration completes successfully.
    /// The callback receives the direction, the migration name and its duration.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(Direction, &str, Duration) + Send + Sync + 'static,
    {
        self.on_migration_complete = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a migration fails.
    /// The callback receives the direction, the migration name and the error.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(Direction, &str, &Error) + Send + Sync + 'static,
    {
        self.on_migration_error = Some(Box::new(callback));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Direct access to the connection, e.g. to inspect the schema in tests.
    pub fn database_mut(&mut self) -> &mut D {
        &mut self.database
    }

    /// An author writing into this migrator's directory.
    pub fn author(&self) -> MigrationAuthor {
        MigrationAuthor::new(self.settings.path())
    }

    /// Applied migrations, most recent first. A `limit` of zero returns all of them.
    pub fn applied(&mut self, limit: usize) -> Result<Vec<HistoryRecord>, Error> {
        self.history.list_applied(&mut self.database, limit)
    }

    /// Migrations on disk that have not been applied, oldest first.
    pub fn pending(&mut self) -> Result<Vec<MigrationUnit>, Error> {
        let applied: HashSet<String> = self
            .applied(0)?
            .into_iter()
            .map(|record| record.name)
            .collect();
        self.repository.list_pending(&applied)
    }

    /// The migrations [SqlMigrator::up] would apply for `count`, in order, without running them.
    pub fn preview_up(&mut self, count: usize) -> Result<Vec<MigrationUnit>, Error> {
        let pending = self.pending()?;
        Ok(take_batch(pending, count))
    }

    /// The migrations [SqlMigrator::down] would revert for `count`, in order, without running them.
    pub fn preview_down(&mut self, count: usize) -> Result<Vec<MigrationUnit>, Error> {
        let applied = take_batch(self.applied(0)?, count);
        applied
            .iter()
            .map(|record| self.repository.unit(&record.name))
            .collect()
    }

    /// Apply up to `count` pending migrations in chronological order; zero applies all of them.
    ///
    /// Returns `Err` only when a migration script cannot be read or the pending set cannot be
    /// computed. A script or history failure halts the run and lands in the report.
    pub fn up(&mut self, count: usize) -> Result<MigrationReport, Error> {
        let batch = self.preview_up(count)?;
        self.run(Direction::Up, batch)
    }

    /// Revert up to `count` applied migrations, most recent first; zero reverts all of them.
    pub fn down(&mut self, count: usize) -> Result<MigrationReport, Error> {
        let batch = self.preview_down(count)?;
        self.run(Direction::Down, batch)
    }

    /// Applied migrations as display lines, most recent first.
    pub fn history(&mut self, limit: usize) -> Result<Vec<String>, Error> {
        Ok(self
            .applied(limit)?
            .iter()
            .map(|record| match record.applied_at_utc() {
                Some(at) => format!(
                    "Migration {} applied at {} UTC",
                    record.name,
                    at.format("%Y-%m-%d %H:%M:%S")
                ),
                None => format!("Migration {} applied at an unknown time", record.name),
            })
            .collect())
    }

    /// Scaffold a new migration in this migrator's directory.
    pub fn create(&self, name: &str) -> Result<MigrationUnit, Error> {
        self.author().create(name)
    }

    fn run(
        &mut self,
        direction: Direction,
        batch: Vec<MigrationUnit>,
    ) -> Result<MigrationReport, Error> {
        let mut report = MigrationReport::new(direction);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            direction = %direction,
            batch = ?batch.iter().map(MigrationUnit::name).collect::<Vec<_>>(),
            "Resolved migration batch"
        );

        for unit in batch {
            let script = unit.read_script(direction)?;

            #[cfg(feature = "tracing")]
            let _span =
                tracing::info_span!("migration", direction = %direction, name = %unit.name())
                    .entered();

            if let Some(ref callback) = self.on_migration_start {
                callback(direction, unit.name());
            }
            let started = Instant::now();

            match self.execute_unit(direction, &unit, &script) {
                Ok(()) => {
                    let duration = started.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(duration_ms = duration.as_millis(), "Migration completed");

                    if let Some(ref callback) = self.on_migration_complete {
                        callback(direction, unit.name(), duration);
                    }
                    report.succeeded.push(unit);
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Migration failed");

                    if let Some(ref callback) = self.on_migration_error {
                        callback(direction, unit.name(), &error);
                    }
                    report.failed = Some(MigrationFailure { unit, error });
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Run one script in its own transaction, then update history.
    fn execute_unit(
        &mut self,
        direction: Direction,
        unit: &MigrationUnit,
        script: &str,
    ) -> Result<(), Error> {
        if !script.trim().is_empty() {
            let execution_error = |source: Error| Error::Execution {
                migration: unit.name().to_string(),
                source: Box::new(source),
            };
            self.database.begin_transaction().map_err(execution_error)?;
            let result = self
                .database
                .execute(script, &[])
                .and_then(|()| self.database.commit());
            if let Err(source) = result {
                if let Err(_rollback_error) = self.database.rollback() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_rollback_error, "Rollback failed");
                }
                return Err(execution_error(source));
            }
        }

        match direction {
            Direction::Up => self.history.record_applied(&mut self.database, unit.name()),
            Direction::Down => self
                .history
                .record_reverted(&mut self.database, unit.name()),
        }
    }
}

impl<D: Database> Drop for SqlMigrator<D> {
    fn drop(&mut self) {
        if let Err(_error) = self.database.close_connection() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_error, "Failed to close database connection");
        }
    }
}

/// The first `count` items, or all of them when `count` is zero.
fn take_batch<T>(mut items: Vec<T>, count: usize) -> Vec<T> {
    if count != 0 {
        items.truncate(count);
    }
    items
}
