use crate::error::Error;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Where migrations live and where their history is recorded.
///
/// `schema` and `table` are interpolated into SQL, so they must be plain identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    schema: String,
    table: String,
    path: PathBuf,
}

impl Settings {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let schema = schema.into();
        let table = table.into();
        for (key, value) in [("schema", &schema), ("table", &table)] {
            if !IDENTIFIER.is_match(value) {
                return Err(Error::Configuration(format!(
                    "`{}` must be an SQL identifier, found '{}'",
                    key, value
                )));
            }
        }
        Ok(Self {
            schema,
            table,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Build settings from a JSON object with `schema`, `table` and `path` string keys.
    ///
    /// ```
    /// use sqlmig::Settings;
    ///
    /// let value = serde_json::json!({ "schema": "migration", "table": "history", "path": "db" });
    /// let settings = Settings::from_value(&value).unwrap();
    /// assert_eq!(settings.qualified_table(), "migration.history");
    ///
    /// let missing = serde_json::json!({ "schema": "migration", "path": "db" });
    /// assert!(Settings::from_value(&missing).is_err());
    /// ```
    pub fn from_value(value: &serde_json::Value) -> Result<Self, Error> {
        let object = value.as_object().ok_or_else(|| {
            Error::Configuration(format!("settings must be an object, found {}", value))
        })?;
        let mut fields = Vec::with_capacity(3);
        for key in ["schema", "table", "path"] {
            let field = match object.get(key) {
                Some(serde_json::Value::String(s)) => s.as_str(),
                Some(other) => {
                    return Err(Error::Configuration(format!(
                        "`{}` setting must be a string, found {}",
                        key, other
                    )))
                }
                None => return Err(Error::Configuration(format!("missing `{}` setting", key))),
            };
            fields.push(field);
        }
        Self::new(fields[0], fields[1], fields[2])
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Root directory holding one subdirectory per migration.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `schema.table`, ready to interpolate into SQL.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}
