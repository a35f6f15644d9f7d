//! Error types for the migration system.

use std::path::PathBuf;

use crate::migration::Direction;

/// Errors that can occur during migration and seed operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// No configuration file was found.
    #[error("{file} not found in {} or any parent directory", start.display())]
    ConfigNotFound {
        /// File name that was searched for.
        file: &'static str,
        /// Directory the search started from.
        start: PathBuf,
    },

    /// A required configuration field is absent.
    #[error("Configuration must specify `{0}`")]
    MissingConfig(&'static str),

    /// The dialect tag is not one of the supported dialects.
    #[error("Unsupported dialect '{0}' (expected postgresql, mysql or sqlite)")]
    UnsupportedDialect(String),

    /// The database URL does not belong to the configured dialect.
    #[error("Database URL scheme '{scheme}' does not match dialect '{dialect}'")]
    DialectMismatch {
        /// Configured dialect.
        dialect: String,
        /// Scheme found in the URL.
        scheme: String,
    },

    /// Failed to parse the configuration file.
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// No migrations directory found.
    #[error("Migrations directory {0} does not exist. Please create it first.")]
    MigrationsDirNotFound(PathBuf),

    /// No seeders directory found.
    #[error("Seeders directory {0} does not exist. Please create it first.")]
    SeedDirNotFound(PathBuf),

    /// A migration code file has no snapshot next to it.
    #[error(
        "Migration file {} has no corresponding snapshot. Your migration files are corrupted; \
         remove the broken migration or regenerate it.",
        .0.display()
    )]
    MissingSnapshot(PathBuf),

    /// A snapshot has no migration code file next to it.
    #[error(
        "Snapshot {} has no corresponding migration file. Your migration files are corrupted; \
         remove the broken snapshot or regenerate it.",
        .0.display()
    )]
    OrphanSnapshot(PathBuf),

    /// Two code files share one migration name.
    #[error("Migration '{0}' is defined by more than one code file")]
    DuplicateMigration(String),

    /// A migration lacks the procedure for the requested direction.
    #[error("Migration '{name}' is missing its {direction} procedure")]
    MissingProcedure {
        /// Migration name.
        name: String,
        /// Direction that was requested.
        direction: Direction,
    },

    /// A Rust migration file exists on disk but nothing was registered for it.
    #[error("Migration '{0}' is a Rust migration but is not registered with the migrator")]
    UnregisteredMigration(String),

    /// A Rust seeder file exists on disk but nothing was registered for it.
    #[error("Seeder '{0}' is a Rust seeder but is not registered with the seed runner")]
    UnregisteredSeeder(String),

    /// Failed to parse a migration or seed file.
    #[error("Failed to parse '{}': {message}", path.display())]
    ParseError {
        /// Path to the file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The ledger already holds a row for this migration.
    #[error("Ledger already records migration '{0}'; the ledger and the run disagree")]
    DuplicateLedgerEntry(String),

    /// A migration procedure failed.
    #[error("Migration '{name}' failed while running {direction}: {source}")]
    MigrationFailed {
        /// Migration name.
        name: String,
        /// Direction that was running.
        direction: Direction,
        /// Underlying failure.
        source: Box<MigrateError>,
    },

    /// A seeder failed.
    #[error("Seeder '{name}' failed: {source}")]
    SeedFailed {
        /// Seeder name.
        name: String,
        /// Underlying failure.
        source: Box<MigrateError>,
    },

    /// The schema diff produced no statements and blank migrations were not allowed.
    #[error("No schema changes detected; pass --force to create a blank migration")]
    NoSchemaChanges,

    /// Migration file already exists.
    #[error("Migration file already exists: {}", .0.display())]
    MigrationExists(PathBuf),

    /// Seeder file already exists.
    #[error("Seeder already exists: {}", .0.display())]
    SeederExists(PathBuf),

    /// No seeder with the given name.
    #[error("Seeder '{0}' not found")]
    SeederNotFound(String),

    /// Error raised by user-supplied migration or seed code.
    #[error("{0}")]
    Custom(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    /// Builds an error from a message, for use in migration and seed code.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
