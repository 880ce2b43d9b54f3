use crate::error::Error;
use crate::repository::MigrationUnit;

/// Which way a run moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply pending migrations with their `up.sql`.
    Up,
    /// Revert applied migrations with their `down.sql`.
    Down,
}

impl Direction {
    /// The script file executed in this direction.
    pub fn script_file(self) -> &'static str {
        match self {
            Self::Up => "up.sql",
            Self::Down => "down.sql",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Represents the migration that halted a run.
#[derive(Debug, PartialEq)]
pub struct MigrationFailure {
    pub(crate) unit: MigrationUnit,
    pub(crate) error: Error,
}

impl MigrationFailure {
    /// Get the migration that failed.
    pub fn unit(&self) -> &MigrationUnit {
        &self.unit
    }

    /// Get the error that caused the migration to fail.
    pub fn error(&self) -> &Error {
        &self.error
    }
}

/// A report of actions performed during an `up` or `down` run.
///
/// `succeeded` is always a prefix of the requested batch. When `failed` is set it holds the
/// unit right after that prefix; nothing after it was attempted.
#[derive(Debug, PartialEq)]
pub struct MigrationReport {
    pub direction: Direction,
    pub succeeded: Vec<MigrationUnit>,
    pub failed: Option<MigrationFailure>,
}

impl MigrationReport {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            succeeded: vec![],
            failed: None,
        }
    }

    /// True when there was nothing to do.
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_none()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Names of the units that completed, in execution order.
    pub fn succeeded_names(&self) -> Vec<&str> {
        self.succeeded.iter().map(MigrationUnit::name).collect()
    }
}
