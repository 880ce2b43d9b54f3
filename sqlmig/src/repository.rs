use crate::core::Direction;
use crate::error::Error;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static UNIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^m(?P<date>\d{8})_(?P<time>\d{6})_(?P<label>[A-Za-z0-9_]+)$")
        .expect("valid unit name pattern")
});

/// A migration on disk: a directory `m{YYYYMMDD}_{HHMMSS}_{label}` holding `up.sql` and `down.sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    name: String,
    timestamp: NaiveDateTime,
    path: PathBuf,
}

impl MigrationUnit {
    /// The full directory name, which is also the key recorded in history.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The creation time encoded in the name.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// The label the author chose, without the timestamp prefix.
    pub fn label(&self) -> &str {
        // "m" + 8 date digits + "_" + 6 time digits + "_"
        &self.name[17..]
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the script run in `direction`.
    pub fn script_path(&self, direction: Direction) -> PathBuf {
        self.path.join(direction.script_file())
    }

    /// Read the script run in `direction`. An empty script is valid and means "nothing to do".
    pub fn read_script(&self, direction: Direction) -> Result<String, Error> {
        let path = self.script_path(direction);
        std::fs::read_to_string(&path).map_err(|source| Error::MigrationFile { path, source })
    }
}

impl std::fmt::Display for MigrationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parse a directory name under `root` into a unit.
/// Returns `None` unless the whole name matches and its date and time are real.
pub fn parse_unit_name(root: &Path, dir_name: &str) -> Option<MigrationUnit> {
    let captures = UNIT_NAME.captures(dir_name)?;
    let stamp = format!("{}{}", captures.name("date")?.as_str(), captures.name("time")?.as_str());
    let timestamp = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S").ok()?;
    Some(MigrationUnit {
        name: dir_name.to_string(),
        timestamp,
        path: root.join(dir_name),
    })
}

/// Discovers migration units under a root directory.
#[derive(Debug, Clone)]
pub struct MigrationRepository {
    root: PathBuf,
}

impl MigrationRepository {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every unit directory under the root, ascending by name.
    /// Entries that are not directories or don't follow the naming convention are skipped.
    pub fn list_all(&self) -> Result<Vec<MigrationUnit>, Error> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            // nothing has been authored yet
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(source) => {
                return Err(Error::MigrationFile {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::MigrationFile {
                path: self.root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match parse_unit_name(&self.root, &dir_name) {
                Some(unit) => units.push(unit),
                // looks like a migration but the date or time is not real
                None if UNIT_NAME.is_match(&dir_name) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        entry = %dir_name,
                        "Skipping migration directory with an invalid timestamp"
                    );
                }
                None => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(entry = %dir_name, "Skipping non-migration directory");
                }
            }
        }
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    /// Units whose names are not in `applied`, oldest first.
    pub fn list_pending(&self, applied: &HashSet<String>) -> Result<Vec<MigrationUnit>, Error> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|unit| !applied.contains(&unit.name))
            .collect())
    }

    /// Rebuild the unit a history record refers to.
    pub fn unit(&self, name: &str) -> Result<MigrationUnit, Error> {
        parse_unit_name(&self.root, name).ok_or_else(|| Error::MigrationFile {
            path: self.root.join(name),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("'{}' is not a migration name", name),
            ),
        })
    }
}
