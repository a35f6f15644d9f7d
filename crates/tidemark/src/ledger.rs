//! Migration ledger.
//!
//! This module manages the ledger table that records which migrations have
//! been applied and in which batch. Every operation takes the connection to
//! run on, so inside a migration run the ledger changes commit or roll back
//! together with the migrations themselves.

use sqlx::AnyConnection;
use tracing::debug;

use crate::dialect::{Dialect, LedgerDialect, LedgerTable};
use crate::error::{MigrateError, Result};

/// A row of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Migration name.
    pub name: String,
    /// Batch the migration was applied in.
    pub batch: i64,
}

/// Parameterized queries against the ledger table.
#[derive(Debug, Clone)]
pub struct Ledger {
    dialect: Dialect,
    table: LedgerTable,
}

impl Ledger {
    /// Creates a ledger for `table` in `dialect`.
    pub fn new(dialect: Dialect, table: LedgerTable) -> Self {
        Self { dialect, table }
    }

    /// Returns the ledger table location.
    #[must_use]
    pub fn table(&self) -> &LedgerTable {
        &self.table
    }

    fn sql(&self) -> &'static dyn LedgerDialect {
        self.dialect.sql()
    }

    fn qualified(&self) -> String {
        self.sql().qualified_table(&self.table)
    }

    /// Ensures the ledger schema (where supported) and table exist.
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> Result<()> {
        if let Some(sql) = self.sql().create_schema_sql(&self.table) {
            debug!(sql = %sql, "Ensuring ledger schema");
            sqlx::query(&sql).execute(&mut *conn).await?;
        }

        let sql = self.sql().create_ledger_sql(&self.table);
        debug!(sql = %sql, "Ensuring ledger table");
        sqlx::query(&sql).execute(&mut *conn).await?;
        Ok(())
    }

    /// Checks whether the ledger table exists, without creating it.
    pub async fn exists(&self, conn: &mut AnyConnection) -> Result<bool> {
        let (sql, binds) = self.sql().ledger_exists_sql(&self.table);
        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        Ok(query.fetch_optional(&mut *conn).await?.is_some())
    }

    /// Returns the highest recorded batch, or `None` when the ledger is empty.
    pub async fn latest_batch(&self, conn: &mut AnyConnection) -> Result<Option<i64>> {
        let sql = format!("SELECT MAX(batch) FROM {}", self.qualified());
        let batch: Option<i64> = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(batch)
    }

    /// Returns the batch a migration was applied in, or `None` when it is not applied.
    pub async fn batch_of(&self, conn: &mut AnyConnection, name: &str) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT batch FROM {} WHERE name = {}",
            self.qualified(),
            self.sql().placeholder(1)
        );
        let batch: Option<i64> = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(batch)
    }

    /// Records a migration as applied in `batch`.
    ///
    /// A second record for the same name means the ledger and the run
    /// disagree; it fails with [`MigrateError::DuplicateLedgerEntry`].
    pub async fn record(&self, conn: &mut AnyConnection, name: &str, batch: i64) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (name, batch) VALUES ({}, {})",
            self.qualified(),
            self.sql().placeholder(1),
            self.sql().placeholder(2)
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(batch)
            .execute(&mut *conn)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    MigrateError::DuplicateLedgerEntry(name.to_string())
                }
                other => MigrateError::Database(other),
            })?;
        Ok(())
    }

    /// Removes a migration record (for rollback).
    pub async fn erase(&self, conn: &mut AnyConnection, name: &str) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE name = {}",
            self.qualified(),
            self.sql().placeholder(1)
        );
        sqlx::query(&sql).bind(name).execute(&mut *conn).await?;
        Ok(())
    }

    /// Returns every ledger row, ordered by name.
    pub async fn entries(&self, conn: &mut AnyConnection) -> Result<Vec<LedgerEntry>> {
        let sql = format!("SELECT name, batch FROM {} ORDER BY name", self.qualified());
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&mut *conn).await?;
        Ok(rows
            .into_iter()
            .map(|(name, batch)| LedgerEntry { name, batch })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn create_test_ledger() -> (Database, Ledger) {
        let db = Database::connect(Dialect::Sqlite, "sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite database");
        let ledger = Ledger::new(Dialect::Sqlite, LedgerTable::default());
        (db, ledger)
    }

    #[tokio::test]
    async fn test_ensure_table() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();

        assert!(!ledger.exists(&mut conn).await.unwrap());
        ledger.ensure_table(&mut conn).await.unwrap();
        // Should be idempotent
        ledger.ensure_table(&mut conn).await.unwrap();
        assert!(ledger.exists(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn test_latest_batch_empty() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();

        assert_eq!(ledger.latest_batch(&mut conn).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_and_batch_of() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();

        assert_eq!(ledger.batch_of(&mut conn, "20240101_000000_init").await.unwrap(), None);

        ledger.record(&mut conn, "20240101_000000_init", 1).await.unwrap();
        ledger.record(&mut conn, "20240102_000000_posts", 2).await.unwrap();

        assert_eq!(
            ledger.batch_of(&mut conn, "20240101_000000_init").await.unwrap(),
            Some(1)
        );
        assert_eq!(ledger.latest_batch(&mut conn).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_record_is_invariant_violation() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();

        ledger.record(&mut conn, "20240101_000000_init", 1).await.unwrap();
        let result = ledger.record(&mut conn, "20240101_000000_init", 2).await;

        assert!(matches!(
            result,
            Err(MigrateError::DuplicateLedgerEntry(name)) if name == "20240101_000000_init"
        ));
    }

    #[tokio::test]
    async fn test_erase() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();

        ledger.record(&mut conn, "20240101_000000_init", 1).await.unwrap();
        ledger.erase(&mut conn, "20240101_000000_init").await.unwrap();

        assert_eq!(ledger.batch_of(&mut conn, "20240101_000000_init").await.unwrap(), None);
        assert!(ledger.entries(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_ordered_by_name() {
        let (db, ledger) = create_test_ledger().await;
        let mut conn = db.acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();

        ledger.record(&mut conn, "20240102_000000_b", 1).await.unwrap();
        ledger.record(&mut conn, "20240101_000000_a", 1).await.unwrap();

        let entries = ledger.entries(&mut conn).await.unwrap();
        assert_eq!(
            entries,
            vec![
                LedgerEntry {
                    name: "20240101_000000_a".to_string(),
                    batch: 1
                },
                LedgerEntry {
                    name: "20240102_000000_b".to_string(),
                    batch: 1
                },
            ]
        );
    }
}
