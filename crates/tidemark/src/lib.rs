//! Batch-tracked database migrations and seeders.
//!
//! `tidemark` applies and reverts migrations stored as files on disk, and
//! records what it applied in a ledger table inside the target database:
//! - Every `up` run applies all pending migrations as one numbered batch
//! - `down` reverts the latest batch, or every batch from a given one upwards
//! - Each run executes inside a single transaction, so it commits or rolls
//!   back as a whole
//! - PostgreSQL, MySQL and SQLite are supported through one sqlx `Any` pool
//!
//! # Architecture
//!
//! - **Store** - Discovers migration files and their snapshots on disk
//! - **Ledger** - Records which migrations ran, in which batch
//! - **Migrator** - Decides what to apply or revert and runs it
//! - **Seed** - Runs data seeders, optionally chaining sub-seeders
//! - **Generate** - Writes new migration and seeder files
//! - **Dialect** - Database-specific ledger SQL
//!
//! # Example
//!
//! ```rust,ignore
//! use tidemark::prelude::*;
//!
//! struct AddIndex;
//!
//! #[async_trait]
//! impl Migration for AddIndex {
//!     async fn up(&self, db: &mut AnyConnection) -> Result<()> {
//!         sqlx::query("CREATE INDEX idx_posts_user ON posts (user_id)")
//!             .execute(db)
//!             .await?;
//!         Ok(())
//!     }
//!
//!     async fn down(&self, db: &mut AnyConnection) -> Result<()> {
//!         sqlx::query("DROP INDEX idx_posts_user").execute(db).await?;
//!         Ok(())
//!     }
//! }
//!
//! let db = Database::connect(Dialect::Sqlite, "sqlite://app.db").await?;
//! let ctx = MigrationContext::new(db, "migrations");
//! let migrator = Migrator::new(&ctx)
//!     .with_registry(MigrationRegistry::new().register("20240102_000000_add_index", AddIndex));
//!
//! let report = migrator.up().await?;
//! println!("applied {:?} in batch {:?}", report.executed, report.batch);
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create a migration from schema changes
//! tidemark generate --name add_posts
//!
//! # Apply pending migrations
//! tidemark up
//!
//! # Roll back the latest batch
//! tidemark down
//!
//! # Show migration status
//! tidemark status
//!
//! # Run the default seeder
//! tidemark seed:run
//! ```

pub mod cli;
pub mod config;
pub mod context;
pub mod database;
pub mod dialect;
pub mod error;
pub mod generate;
pub mod ledger;
pub mod migration;
pub mod migrator;
pub mod seed;
pub mod status;
pub mod store;

/// Prelude for convenient imports.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use sqlx::AnyConnection;

    pub use crate::config::{SeedSettings, Settings};
    pub use crate::context::MigrationContext;
    pub use crate::database::Database;
    pub use crate::dialect::{Dialect, LedgerTable};
    pub use crate::error::{MigrateError, Result};
    pub use crate::generate::{NoDiff, SchemaDiff, Snapshot};
    pub use crate::migration::{Direction, Migration, MigrationRegistry, SqlMigration};
    pub use crate::migrator::{MigrationReport, Migrator};
    pub use crate::seed::{
        seeder, SeedContext, SeedRegistry, SeedRunner, SeedState, Seeder, SeederConstructor,
        SqlSeeder,
    };
    pub use crate::status::{MigrationState, MigrationStatus};
}
