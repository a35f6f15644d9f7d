//! Database adapter.
//!
//! Wraps a sqlx [`AnyPool`] together with the configured [`Dialect`] so the
//! rest of the crate can execute statements and open transactions without
//! caring which backend it is talking to.

use futures::future::BoxFuture;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool};
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};

/// A live database handle for one dialect.
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Connects to `url`, which must belong to `dialect`.
    ///
    /// The URL scheme is checked before any connection is attempted. The
    /// pool holds a single connection so every statement of a run goes
    /// through the same session.
    pub async fn connect(dialect: Dialect, url: &str) -> Result<Self> {
        check_url(dialect, url)?;
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        debug!(dialect = %dialect, "Connected to database");

        Ok(Self::from_pool(pool, dialect))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: AnyPool, dialect: Dialect) -> Self {
        Self { pool, dialect }
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Checks a connection out of the pool, outside of any transaction.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>> {
        Ok(self.pool.acquire().await?)
    }

    /// Executes a statement and returns the rows it produced.
    pub async fn execute(&self, sql: &str) -> Result<Vec<AnyRow>> {
        debug!(sql = %sql, "Executing SQL");
        Ok(sqlx::query(sql).fetch_all(&self.pool).await?)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. When `f` fails, every statement it issued
    /// is rolled back and the original error is returned.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut tx = self.pool.begin().await?;
        debug!("Transaction started");

        let outcome = f(&mut *tx).await;
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                } else {
                    debug!("Transaction rolled back");
                }
                Err(err)
            }
        }
    }
}

/// Checks that a database URL belongs to `dialect`.
pub fn check_url(dialect: Dialect, url: &str) -> Result<()> {
    let scheme = url.split(':').next().unwrap_or_default();
    if dialect.accepts_scheme(scheme) {
        Ok(())
    } else {
        Err(MigrateError::DialectMismatch {
            dialect: dialect.to_string(),
            scheme: scheme.to_string(),
        })
    }
}
