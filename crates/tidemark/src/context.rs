//! Per-invocation migration context.

use std::path::PathBuf;

use crate::config::{SeedSettings, Settings};
use crate::database::Database;
use crate::dialect::{Dialect, LedgerTable};
use crate::error::{MigrateError, Result};
use crate::ledger::Ledger;

/// Everything a command needs: where the files are and where the database is.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    /// Directory holding migration files.
    pub migrations_dir: PathBuf,
    /// Seed settings, if seeding is configured.
    pub seed: Option<SeedSettings>,
    /// Target dialect.
    pub dialect: Dialect,
    /// Connected database.
    pub database: Database,
    /// Ledger table location.
    pub ledger_table: LedgerTable,
}

impl MigrationContext {
    /// Builds a context around an already connected database.
    #[must_use]
    pub fn new(database: Database, migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            seed: None,
            dialect: database.dialect(),
            database,
            ledger_table: LedgerTable::default(),
        }
    }

    /// Connects to the configured database and builds a context.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let database = Database::connect(settings.dialect, &settings.database_url).await?;
        Ok(Self {
            migrations_dir: settings.migrations_dir.clone(),
            seed: settings.seed.clone(),
            dialect: settings.dialect,
            database,
            ledger_table: settings.ledger_table.clone(),
        })
    }

    /// Sets the ledger table location.
    #[must_use]
    pub fn with_ledger_table(mut self, table: LedgerTable) -> Self {
        self.ledger_table = table;
        self
    }

    /// Sets the seed settings.
    #[must_use]
    pub fn with_seed(mut self, seed: SeedSettings) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the ledger for this context.
    #[must_use]
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.dialect, self.ledger_table.clone())
    }

    /// Returns the seed settings, which seed commands require.
    pub fn seed(&self) -> Result<&SeedSettings> {
        self.seed.as_ref().ok_or(MigrateError::MissingConfig("seed"))
    }
}
