//! Seed units and the seed runner.
//!
//! Seeders populate a database with data after it has been migrated. They
//! are not recorded anywhere, so running a seeder twice runs it twice.
//!
//! A seeder can run other seeders through [`SeedContext::call`]; the whole
//! chain shares one transaction and one [`SeedState`].
//!
//! ```ignore
//! #[derive(Default)]
//! struct DbSeeder;
//!
//! #[async_trait]
//! impl Seeder for DbSeeder {
//!     async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
//!         ctx.call(&[seeder::<AdminSeeder>, seeder::<PostSeeder>]).await
//!     }
//! }
//! ```

mod runner;
mod state;

pub use runner::SeedRunner;
pub use state::SeedState;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::migration::is_blank_sql;
use crate::store::{CodeKind, SeedFile};

/// A routine that inserts data.
#[async_trait]
pub trait Seeder: Send + Sync {
    /// Name used in logs and errors. Defaults to the type name.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Runs the seeder.
    async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()>;
}

/// Builds a fresh seeder instance.
pub type SeederConstructor = fn() -> Box<dyn Seeder>;

/// Constructor for any `Default` seeder, usable as a [`SeederConstructor`].
pub fn seeder<S: Seeder + Default + 'static>() -> Box<dyn Seeder> {
    Box::new(S::default())
}

/// What a seeder sees while it runs.
pub struct SeedContext<'a> {
    db: &'a mut AnyConnection,
    state: &'a mut SeedState,
}

impl<'a> SeedContext<'a> {
    /// Creates a context over a connection and a state bag.
    pub fn new(db: &'a mut AnyConnection, state: &'a mut SeedState) -> Self {
        Self { db, state }
    }

    /// Returns the connection of the surrounding transaction.
    pub fn db(&mut self) -> &mut AnyConnection {
        &mut *self.db
    }

    /// Returns the shared state.
    #[must_use]
    pub fn state(&self) -> &SeedState {
        &*self.state
    }

    /// Returns the shared state for writing.
    pub fn state_mut(&mut self) -> &mut SeedState {
        &mut *self.state
    }

    /// Runs sub-seeders in order, with this context's connection and state.
    pub async fn call(&mut self, seeders: &[SeederConstructor]) -> Result<()> {
        for construct in seeders {
            let unit = construct();
            info!(name = %unit.name(), "Running seeder");
            unit.seed(self).await?;
            info!(name = %unit.name(), "Seeder completed");
        }
        Ok(())
    }
}

impl fmt::Debug for SeedContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedContext")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// A seeder defined by a `.sql` file, executed as one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSeeder {
    name: String,
    sql: String,
}

impl SqlSeeder {
    /// Creates a SQL seeder.
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// Reads a SQL seeder from a file; the seeder is named after the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, std::fs::read_to_string(path)?))
    }
}

#[async_trait]
impl Seeder for SqlSeeder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
        if is_blank_sql(&self.sql) {
            debug!(name = %self.name, "Seeder is blank, nothing to execute");
            return Ok(());
        }
        debug!(sql = %self.sql, "Executing SQL");
        sqlx::Executor::execute(&mut *ctx.db, sqlx::raw_sql(&self.sql)).await?;
        Ok(())
    }
}

/// Rust seeders compiled into the binary, keyed by seed file stem.
#[derive(Debug, Clone, Default)]
pub struct SeedRegistry {
    seeders: BTreeMap<String, SeederConstructor>,
}

impl SeedRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a seeder constructor under `name`.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, constructor: SeederConstructor) -> Self {
        self.seeders.insert(name.into(), constructor);
        self
    }

    /// Returns the constructor registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SeederConstructor> {
        self.seeders.get(name).copied()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeders.is_empty()
    }

    /// Loads the seeder described by a file on disk.
    pub fn load(&self, file: &SeedFile) -> Result<Box<dyn Seeder>> {
        match file.kind {
            CodeKind::Sql => Ok(Box::new(SqlSeeder::from_file(&file.path)?)),
            CodeKind::Rust => self
                .get(&file.name)
                .map(|construct| construct())
                .ok_or_else(|| MigrateError::UnregisteredSeeder(file.name.clone())),
        }
    }
}
