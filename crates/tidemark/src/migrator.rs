//! Migration orchestrator.
//!
//! This module decides which migrations to apply or revert, runs them in a
//! single transaction per invocation and keeps the ledger in step.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::MigrationContext;
use crate::database::Database;
use crate::error::{MigrateError, Result};
use crate::ledger::Ledger;
use crate::migration::{Direction, Migration, MigrationRegistry};
use crate::status::MigrationStatus;
use crate::store::{self, MigrationFile};

/// Outcome of one apply or revert run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Direction of the run.
    pub direction: Direction,
    /// Batch recorded by an apply run, or the lowest batch a revert run erased.
    pub batch: Option<i64>,
    /// Migrations that ran, in execution order.
    pub executed: Vec<String>,
}

impl MigrationReport {
    fn noop(direction: Direction) -> Self {
        Self {
            direction,
            batch: None,
            executed: Vec::new(),
        }
    }

    /// Returns true if no migration ran.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Which ledger batches a revert run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackRange {
    /// Exactly the latest batch.
    Latest(i64),
    /// Every batch from the given one upwards; 0 covers everything.
    From(i64),
}

impl RollbackRange {
    /// Builds the range for an optional target batch.
    #[must_use]
    pub fn new(target: Option<i64>, latest: i64) -> Self {
        match target {
            Some(batch) => Self::From(batch),
            None => Self::Latest(latest),
        }
    }

    /// Returns whether a migration recorded in `batch` is reverted.
    #[must_use]
    pub fn contains(&self, batch: i64) -> bool {
        match *self {
            Self::Latest(latest) => batch == latest,
            Self::From(lowest) => batch >= lowest,
        }
    }
}

/// Applies and reverts migrations found in a directory.
#[derive(Debug, Clone)]
pub struct Migrator {
    db: Database,
    ledger: Ledger,
    migrations_dir: PathBuf,
    registry: MigrationRegistry,
}

impl Migrator {
    /// Creates a migrator for a context.
    #[must_use]
    pub fn new(ctx: &MigrationContext) -> Self {
        Self {
            db: ctx.database.clone(),
            ledger: ctx.ledger(),
            migrations_dir: ctx.migrations_dir.clone(),
            registry: MigrationRegistry::new(),
        }
    }

    /// Sets the registry Rust migrations are resolved from.
    #[must_use]
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the migrations directory.
    #[must_use]
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Ensures the ledger table exists and returns the latest batch (0 when empty).
    async fn prepare_ledger(&self) -> Result<i64> {
        // The pool holds a single connection; it is released before the
        // run's transaction begins.
        let mut conn = self.db.acquire().await?;
        self.ledger.ensure_table(&mut conn).await?;
        Ok(self.ledger.latest_batch(&mut conn).await?.unwrap_or(0))
    }

    /// Applies every pending migration as one new batch.
    ///
    /// All migrations of the run commit together or not at all.
    pub async fn up(&self) -> Result<MigrationReport> {
        let files = store::list_migration_files(&self.migrations_dir)?;
        if files.is_empty() {
            info!("No migrations to run");
            return Ok(MigrationReport::noop(Direction::Up));
        }

        let batch = self.prepare_ledger().await? + 1;
        let ledger = self.ledger.clone();
        let registry = self.registry.clone();

        let executed = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let mut executed = Vec::new();
                    for file in &files {
                        if let Some(applied) = ledger.batch_of(conn, &file.name).await? {
                            debug!(name = %file.name, batch = applied, "Already applied, skipping");
                            continue;
                        }

                        let migration = load(&registry, file, Direction::Up)?;
                        info!(name = %file.name, batch, "Applying migration");
                        migration
                            .up(conn)
                            .await
                            .map_err(|err| failed(&file.name, Direction::Up, err))?;
                        ledger.record(conn, &file.name, batch).await?;
                        info!(name = %file.name, "Migration applied successfully");

                        executed.push(file.name.clone());
                    }
                    Ok::<_, MigrateError>(executed)
                })
            })
            .await?;

        if executed.is_empty() {
            info!("No migrations to run");
            return Ok(MigrationReport::noop(Direction::Up));
        }
        info!(count = executed.len(), batch, "Migrations applied");

        Ok(MigrationReport {
            direction: Direction::Up,
            batch: Some(batch),
            executed,
        })
    }

    /// Reverts migrations, newest first.
    ///
    /// Without a target only the latest batch is reverted. With a target
    /// every batch from it upwards is reverted, so `Some(0)` reverts
    /// everything. A target above the latest batch is a no-op.
    pub async fn down(&self, target: Option<i64>) -> Result<MigrationReport> {
        let mut files = store::list_migration_files(&self.migrations_dir)?;
        if files.is_empty() {
            info!("No migrations to run");
            return Ok(MigrationReport::noop(Direction::Down));
        }
        files.reverse();

        let latest = self.prepare_ledger().await?;
        if let Some(target) = target {
            if target > latest {
                warn!(
                    requested = target,
                    latest,
                    "No migrations to run, requested batch is higher than the latest batch"
                );
                return Ok(MigrationReport::noop(Direction::Down));
            }
        }
        if latest == 0 {
            info!("No migrations to run");
            return Ok(MigrationReport::noop(Direction::Down));
        }

        let range = RollbackRange::new(target, latest);
        let ledger = self.ledger.clone();
        let registry = self.registry.clone();

        let (executed, lowest) = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let mut executed = Vec::new();
                    let mut lowest: Option<i64> = None;
                    for file in &files {
                        let Some(batch) = ledger.batch_of(conn, &file.name).await? else {
                            continue;
                        };
                        if !range.contains(batch) {
                            continue;
                        }

                        let migration = load(&registry, file, Direction::Down)?;
                        info!(name = %file.name, batch, "Rolling back migration");
                        migration
                            .down(conn)
                            .await
                            .map_err(|err| failed(&file.name, Direction::Down, err))?;
                        ledger.erase(conn, &file.name).await?;
                        info!(name = %file.name, "Migration rolled back successfully");

                        executed.push(file.name.clone());
                        lowest = Some(lowest.map_or(batch, |low| low.min(batch)));
                    }
                    Ok::<_, MigrateError>((executed, lowest))
                })
            })
            .await?;

        if executed.is_empty() {
            info!("No migrations to run");
            return Ok(MigrationReport::noop(Direction::Down));
        }
        info!(count = executed.len(), "Migrations rolled back");

        Ok(MigrationReport {
            direction: Direction::Down,
            batch: lowest,
            executed,
        })
    }

    /// Reverts every applied migration.
    pub async fn fresh(&self) -> Result<MigrationReport> {
        self.down(Some(0)).await
    }

    /// Reverts everything, then applies everything again.
    ///
    /// The two halves run as separate transactions.
    pub async fn refresh(&self) -> Result<(MigrationReport, MigrationReport)> {
        let reverted = self.fresh().await?;
        let applied = self.up().await?;
        Ok((reverted, applied))
    }

    /// Reports, for every migration on disk, whether it is applied.
    ///
    /// Read-only: a missing ledger table means everything is pending.
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let files = store::list_migration_files(&self.migrations_dir)?;
        let mut conn = self.db.acquire().await?;
        let ledger_exists = self.ledger.exists(&mut conn).await?;

        let mut rows = Vec::with_capacity(files.len());
        for file in &files {
            let batch = if ledger_exists {
                self.ledger.batch_of(&mut conn, &file.name).await?
            } else {
                None
            };
            rows.push(MigrationStatus::new(file.name.clone(), batch));
        }

        if ledger_exists {
            for entry in self.ledger.entries(&mut conn).await? {
                if !files.iter().any(|file| file.name == entry.name) {
                    warn!(
                        name = %entry.name,
                        batch = entry.batch,
                        "Ledger records a migration that is not on disk"
                    );
                }
            }
        }

        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}

/// Loads a migration and checks that it has the procedure for `direction`.
fn load(
    registry: &MigrationRegistry,
    file: &MigrationFile,
    direction: Direction,
) -> Result<Arc<dyn Migration>> {
    let migration = registry.load(file)?;
    if !migration.provides(direction) {
        return Err(MigrateError::MissingProcedure {
            name: file.name.clone(),
            direction,
        });
    }
    Ok(migration)
}

fn failed(name: &str, direction: Direction, source: MigrateError) -> MigrateError {
    MigrateError::MigrationFailed {
        name: name.to_string(),
        direction,
        source: Box::new(source),
    }
}
