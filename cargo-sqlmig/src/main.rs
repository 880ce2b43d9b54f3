//! Cargo subcommand for sqlmig database migrations.
//!
//! Settings are read from `[package.metadata.sqlmig]` in the current project's `Cargo.toml`
//! and can be overridden on the command line:
//!
//! ```toml
//! [package.metadata.sqlmig]
//! schema = "migration"
//! table = "history"
//! path = "db/migrations"
//! database_url_env = "DATABASE_URL"
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cargo_metadata::MetadataCommand;
use clap::Parser;
use serde::Deserialize;
use sqlmig::postgres::PostgresDatabase;
use sqlmig::sqlite::SqliteDatabase;
use sqlmig::{
    Database, Direction, MigrationAuthor, MigrationReport, MigrationUnit, Settings, SqlMigrator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cargo")]
#[command(bin_name = "cargo")]
struct Cargo {
    #[command(subcommand)]
    command: CargoCommands,
}

#[derive(clap::Subcommand)]
enum CargoCommands {
    /// Run sqlmig database migrations
    Sqlmig(SqlmigArgs),
}

#[derive(clap::Args)]
struct SqlmigArgs {
    /// Schema holding the history table
    #[arg(long, global = true)]
    schema: Option<String>,
    /// Name of the history table
    #[arg(long, global = true)]
    table: Option<String>,
    /// Directory containing one subdirectory per migration
    #[arg(long, global = true)]
    path: Option<PathBuf>,
    /// Database URL (`postgres://...`, `sqlite://file.db` or a SQLite file path)
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Apply pending migrations, oldest first (0 applies all)
    Up {
        #[arg(default_value_t = 0)]
        count: usize,
    },
    /// Revert applied migrations, newest first (0 reverts all)
    Down {
        #[arg(default_value_t = 0)]
        count: usize,
    },
    /// Show applied migrations, newest first
    History {
        /// Show at most this many entries (0 shows all)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Create a new migration with empty up.sql and down.sql
    Create { name: String },
    /// Show applied and pending migration counts
    Status,
    /// List the migrations `up` or `down` would run, without running them
    Preview {
        direction: PreviewDirection,
        #[arg(default_value_t = 0)]
        count: usize,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PreviewDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
struct SqlmigConfig {
    schema: Option<String>,
    table: Option<String>,
    /// Relative paths are resolved against the package directory
    path: Option<PathBuf>,
    /// Environment variable holding the database URL (default: "DATABASE_URL")
    #[serde(default = "default_database_url_env")]
    database_url_env: String,
}

impl Default for SqlmigConfig {
    fn default() -> Self {
        Self {
            schema: None,
            table: None,
            path: None,
            database_url_env: default_database_url_env(),
        }
    }
}

fn default_database_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cargo {
        command: CargoCommands::Sqlmig(args),
    } = Cargo::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: SqlmigArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_project_config()?;
    let settings = resolve_settings(&config, &args)?;
    tracing::debug!(?settings, "Resolved settings");

    let SqlmigArgs {
        database_url,
        command,
        ..
    } = args;

    let command = match command {
        // creating a migration only touches the filesystem
        Command::Create { name } => {
            let unit = MigrationAuthor::new(settings.path()).create(&name)?;
            println!("Migration {} created in {}", unit.name(), unit.path().display());
            return Ok(ExitCode::SUCCESS);
        }
        command => command,
    };

    let database_url = match database_url {
        Some(url) => url,
        None => std::env::var(&config.database_url_env)
            .map_err(|_| format!("Environment variable {} not set", config.database_url_env))?,
    };
    let mut migrator = SqlMigrator::try_new(connect(&database_url)?, settings)?;

    match command {
        Command::Up { count } => Ok(print_report(&migrator.up(count)?)),
        Command::Down { count } => Ok(print_report(&migrator.down(count)?)),
        Command::History { limit } => {
            let lines = migrator.history(limit)?;
            if lines.is_empty() {
                println!("Migration history is empty");
            }
            for line in lines {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let applied = migrator.applied(0)?;
            let pending = migrator.pending()?;
            println!("Applied migrations: {}", applied.len());
            if let Some(latest) = applied.first() {
                println!("Latest applied: {}", latest.name);
            }
            println!("Pending migrations: {}", pending.len());
            print_units(&pending);
            Ok(ExitCode::SUCCESS)
        }
        Command::Preview { direction, count } => {
            let units = match direction {
                PreviewDirection::Up => migrator.preview_up(count)?,
                PreviewDirection::Down => migrator.preview_down(count)?,
            };
            if units.is_empty() {
                println!("Nothing to run");
            }
            print_units(&units);
            Ok(ExitCode::SUCCESS)
        }
        Command::Create { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Read `[package.metadata.sqlmig]`, or defaults when not inside a Cargo project.
fn load_project_config() -> Result<SqlmigConfig, Box<dyn std::error::Error>> {
    let metadata = match MetadataCommand::new().no_deps().exec() {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!(error = %e, "No Cargo project found, using command line settings only");
            return Ok(SqlmigConfig::default());
        }
    };
    let Some(package) = metadata.root_package() else {
        return Ok(SqlmigConfig::default());
    };
    let Some(value) = package.metadata.get("sqlmig") else {
        return Ok(SqlmigConfig::default());
    };
    let mut config: SqlmigConfig = serde_json::from_value(value.clone())
        .map_err(|e| format!("Invalid [package.metadata.sqlmig] config: {}", e))?;
    if let Some(package_dir) = package.manifest_path.parent() {
        config.path = config
            .path
            .take()
            .map(|path| resolve_relative(package_dir.as_std_path(), &path));
    }
    Ok(config)
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Command line flags win over project metadata. Missing keys surface as configuration errors.
fn resolve_settings(config: &SqlmigConfig, args: &SqlmigArgs) -> Result<Settings, sqlmig::Error> {
    let mut object = serde_json::Map::new();
    let schema = args.schema.as_ref().or(config.schema.as_ref());
    let table = args.table.as_ref().or(config.table.as_ref());
    let path = args.path.as_ref().or(config.path.as_ref());
    if let Some(schema) = schema {
        object.insert("schema".to_string(), schema.clone().into());
    }
    if let Some(table) = table {
        object.insert("table".to_string(), table.clone().into());
    }
    if let Some(path) = path {
        object.insert(
            "path".to_string(),
            path.to_string_lossy().into_owned().into(),
        );
    }
    Settings::from_value(&serde_json::Value::Object(object))
}

fn connect(url: &str) -> Result<Box<dyn Database>, sqlmig::Error> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Box::new(PostgresDatabase::connect(url, postgres::NoTls)?))
    } else {
        let path = url.strip_prefix("sqlite://").unwrap_or(url);
        Ok(Box::new(SqliteDatabase::open(path)?))
    }
}

fn print_units(units: &[MigrationUnit]) {
    for unit in units {
        println!("  {} ({})", unit.name(), unit.timestamp().format("%Y-%m-%d %H:%M:%S"));
    }
}

/// Print a run report. Any failure makes the process exit unsuccessfully.
fn print_report(report: &MigrationReport) -> ExitCode {
    let (verb, noun) = match report.direction {
        Direction::Up => ("applied", "apply"),
        Direction::Down => ("reverted", "revert"),
    };
    if report.is_empty() {
        println!("No migrations to {}", noun);
        return ExitCode::SUCCESS;
    }
    for unit in &report.succeeded {
        println!("Migration {} {}", unit.name(), verb);
    }
    match &report.failed {
        Some(failure) => {
            eprintln!(
                "Failed to {} migration {}: {}",
                noun,
                failure.unit().name(),
                failure.error()
            );
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> SqlmigArgs {
        let Cargo {
            command: CargoCommands::Sqlmig(args),
        } = Cargo::try_parse_from(argv).unwrap();
        args
    }

    #[test]
    fn parses_counts_and_global_flags() {
        let args = parse(&["cargo", "sqlmig", "up", "2", "--schema", "migration"]);
        assert!(matches!(args.command, Command::Up { count: 2 }));
        assert_eq!(args.schema.as_deref(), Some("migration"));

        let args = parse(&["cargo", "sqlmig", "down"]);
        assert!(matches!(args.command, Command::Down { count: 0 }));

        let args = parse(&["cargo", "sqlmig", "history", "--limit", "5"]);
        assert!(matches!(args.command, Command::History { limit: 5 }));
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert!(Cargo::try_parse_from(["cargo", "sqlmig", "up", "-1"]).is_err());
    }

    #[test]
    fn flags_override_project_config() {
        let config = SqlmigConfig {
            schema: Some("migration".to_string()),
            table: Some("history".to_string()),
            path: Some(PathBuf::from("/project/db")),
            ..SqlmigConfig::default()
        };
        let args = parse(&["cargo", "sqlmig", "status", "--table", "applied"]);
        let settings = resolve_settings(&config, &args).unwrap();
        assert_eq!(settings.qualified_table(), "migration.applied");
        assert_eq!(settings.path(), Path::new("/project/db"));
    }

    #[test]
    fn missing_settings_are_configuration_errors() {
        let args = parse(&["cargo", "sqlmig", "status", "--schema", "migration"]);
        let err = resolve_settings(&SqlmigConfig::default(), &args).unwrap_err();
        assert_eq!(
            err,
            sqlmig::Error::Configuration("missing `table` setting".to_string())
        );
    }

    #[test]
    fn config_defaults_database_url_env() {
        let config: SqlmigConfig =
            serde_json::from_value(serde_json::json!({ "schema": "migration" })).unwrap();
        assert_eq!(config.database_url_env, "DATABASE_URL");
        assert_eq!(config.path, None);
    }

    #[test]
    fn relative_paths_resolve_against_package() {
        assert_eq!(
            resolve_relative(Path::new("/project"), Path::new("db")),
            PathBuf::from("/project/db")
        );
        assert_eq!(
            resolve_relative(Path::new("/project"), Path::new("/abs/db")),
            PathBuf::from("/abs/db")
        );
    }
}
