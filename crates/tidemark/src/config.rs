//! Configuration file loading.
//!
//! ```toml
//! dialect = "postgresql"
//! database_url = "postgres://localhost/app"
//!
//! [migrations]
//! dir = "migrations"
//! table = "tidemark_migrations"
//! schema = "public"
//!
//! [seed]
//! dir = "seeders"
//! default_seeder = "db-seeder"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::dialect::{Dialect, LedgerTable};
use crate::error::{MigrateError, Result};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "tidemark.toml";

/// Seeder run when none is named.
pub const DEFAULT_SEEDER: &str = "db-seeder";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    dialect: Option<String>,
    database_url: Option<String>,
    migrations: Option<RawMigrations>,
    seed: Option<RawSeed>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMigrations {
    dir: Option<PathBuf>,
    table: Option<String>,
    schema: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSeed {
    dir: Option<PathBuf>,
    default_seeder: Option<String>,
}

/// Seed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSettings {
    /// Directory holding seed files.
    pub dir: PathBuf,
    /// Seeder run by `seed:run` when no name is given.
    pub default_seeder: String,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Target dialect.
    pub dialect: Dialect,
    /// Connection URL.
    pub database_url: String,
    /// Directory holding migration files.
    pub migrations_dir: PathBuf,
    /// Ledger table location.
    pub ledger_table: LedgerTable,
    /// Seed settings, if seeding is configured.
    pub seed: Option<SeedSettings>,
}

impl Settings {
    /// Loads and validates a configuration file.
    ///
    /// `database_url` overrides the URL in the file.
    pub fn load(path: &Path, database_url: Option<String>) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base_dir, database_url)
    }

    /// Parses and validates configuration text.
    ///
    /// Relative directories are resolved against `base_dir`.
    pub fn from_toml(text: &str, base_dir: &Path, database_url: Option<String>) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;

        let dialect: Dialect = raw
            .dialect
            .ok_or(MigrateError::MissingConfig("dialect"))?
            .parse()?;
        let database_url = database_url
            .or(raw.database_url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(MigrateError::MissingConfig("database_url"))?;

        let migrations = raw.migrations.unwrap_or_default();
        let migrations_dir = migrations
            .dir
            .ok_or(MigrateError::MissingConfig("migrations.dir"))?;
        let ledger_table = LedgerTable::new(
            migrations
                .table
                .unwrap_or_else(|| LedgerTable::DEFAULT_NAME.to_string()),
        )
        .in_schema(
            migrations
                .schema
                .unwrap_or_else(|| LedgerTable::DEFAULT_SCHEMA.to_string()),
        );

        let seed = raw
            .seed
            .map(|seed| -> Result<SeedSettings> {
                Ok(SeedSettings {
                    dir: resolve(base_dir, seed.dir.ok_or(MigrateError::MissingConfig("seed.dir"))?),
                    default_seeder: seed
                        .default_seeder
                        .unwrap_or_else(|| DEFAULT_SEEDER.to_string()),
                })
            })
            .transpose()?;

        Ok(Self {
            dialect,
            database_url,
            migrations_dir: resolve(base_dir, migrations_dir),
            ledger_table,
            seed,
        })
    }

    /// Returns the seed settings, which seed commands require.
    pub fn seed(&self) -> Result<&SeedSettings> {
        self.seed.as_ref().ok_or(MigrateError::MissingConfig("seed"))
    }
}

fn resolve(base_dir: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_relative() {
        base_dir.join(dir)
    } else {
        dir
    }
}

/// Finds the configuration file by walking up from `start`.
///
/// The search stops at the first directory containing `.git`, or at the
/// filesystem root.
pub fn discover(start: &Path) -> Result<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "Found configuration");
            return Ok(candidate);
        }
        if dir.join(".git").exists() {
            break;
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
    Err(MigrateError::ConfigNotFound {
        file: CONFIG_FILE,
        start: start.to_path_buf(),
    })
}
