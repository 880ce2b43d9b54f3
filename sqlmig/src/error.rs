use std::path::PathBuf;

/// Error type for the sqlmig crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required setting is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The history schema or table could not be created.
    #[error("failed to initialize {object}: {source}")]
    SchemaInit {
        object: String,
        #[source]
        source: Box<Error>,
    },
    /// A migration script or the migrations directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    MigrationFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A migration script failed inside its transaction.
    #[error("failed to execute migration {migration}: {source}")]
    Execution {
        migration: String,
        #[source]
        source: Box<Error>,
    },
    /// The history row for a migration could not be written or removed.
    #[error("failed to update history for migration {migration}: {source}")]
    HistoryWrite {
        migration: String,
        #[source]
        source: Box<Error>,
    },
    #[error("invalid migration name '{0}': only letters, digits and underscores are allowed")]
    InvalidName(String),
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create migration file {}: {source}", path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("database connection is closed")]
    ConnectionClosed,
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Generic(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

// Manual PartialEq implementation because io::Error and postgres::Error don't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Configuration(a), Self::Configuration(b)) => a == b,
            (
                Self::SchemaInit { object: a, source: sa },
                Self::SchemaInit { object: b, source: sb },
            ) => a == b && sa == sb,
            (
                Self::MigrationFile { path: a, source: sa },
                Self::MigrationFile { path: b, source: sb },
            ) => a == b && sa.kind() == sb.kind(),
            (
                Self::Execution { migration: a, source: sa },
                Self::Execution { migration: b, source: sb },
            ) => a == b && sa == sb,
            (
                Self::HistoryWrite { migration: a, source: sa },
                Self::HistoryWrite { migration: b, source: sb },
            ) => a == b && sa == sb,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (
                Self::DirectoryCreate { path: a, source: sa },
                Self::DirectoryCreate { path: b, source: sb },
            ) => a == b && sa.kind() == sb.kind(),
            (
                Self::FileCreate { path: a, source: sa },
                Self::FileCreate { path: b, source: sb },
            ) => a == b && sa.kind() == sb.kind(),
            (Self::ConnectionClosed, Self::ConnectionClosed) => true,
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "postgres")]
            (Self::Postgres(a), Self::Postgres(b)) => a.to_string() == b.to_string(),
            (Self::Generic(a), Self::Generic(b)) => a == b,
            _ => false,
        }
    }
}
