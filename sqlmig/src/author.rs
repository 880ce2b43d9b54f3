use crate::core::Direction;
use crate::error::Error;
use crate::repository::{parse_unit_name, MigrationUnit};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs::{DirBuilder, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid label pattern"));

/// Scaffolds new migration units under a root directory.
#[derive(Debug, Clone)]
pub struct MigrationAuthor {
    root: PathBuf,
}

impl MigrationAuthor {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create `m{now:%Y%m%d_%H%M%S}_{name}` with empty `up.sql` and `down.sql`.
    pub fn create(&self, name: &str) -> Result<MigrationUnit, Error> {
        self.create_at(name, Utc::now())
    }

    /// Like [MigrationAuthor::create], stamped with `at` instead of the current time.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sqlmig::MigrationAuthor;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
    /// let unit = MigrationAuthor::new(dir.path()).create_at("add_users", at).unwrap();
    /// assert_eq!(unit.name(), "m20240305_143000_add_users");
    /// ```
    pub fn create_at(&self, name: &str, at: DateTime<Utc>) -> Result<MigrationUnit, Error> {
        if !LABEL.is_match(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let full_name = format!("m{}_{}", at.format("%Y%m%d_%H%M%S"), name);
        let unit = parse_unit_name(&self.root, &full_name)
            .ok_or_else(|| Error::InvalidName(name.to_string()))?;

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o775);
        }
        if let Err(source) = builder.create(unit.path()) {
            if !unit.path().is_dir() {
                return Err(Error::DirectoryCreate {
                    path: unit.path().to_path_buf(),
                    source,
                });
            }
        }

        for direction in [Direction::Up, Direction::Down] {
            let path = unit.script_path(direction);
            // never clobber a script that already has content
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|source| Error::FileCreate { path, source })?;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(migration = %unit.name(), path = %unit.path().display(), "Created migration");

        Ok(unit)
    }
}
