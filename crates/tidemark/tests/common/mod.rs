#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tidemark::ledger::LedgerEntry;
use tidemark::prelude::*;

pub struct TestEnv {
    pub tmp: TempDir,
    pub ctx: MigrationContext,
}

impl TestEnv {
    pub fn migrations_dir(&self) -> &Path {
        &self.ctx.migrations_dir
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(&self.ctx)
    }

    pub fn db(&self) -> &Database {
        &self.ctx.database
    }
}

/// In-memory SQLite database with an empty migrations directory.
pub async fn setup() -> TestEnv {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("migrations");
    fs::create_dir_all(&dir).unwrap();

    let db = Database::connect(Dialect::Sqlite, "sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite database");

    TestEnv {
        tmp,
        ctx: MigrationContext::new(db, dir),
    }
}

/// Writes a SQL migration and an empty snapshot.
pub fn write_migration(dir: &Path, name: &str, up: &str, down: &str) {
    fs::write(
        dir.join(format!("{name}.sql")),
        format!("-- migrate:up\n{up}\n\n-- migrate:down\n{down}\n"),
    )
    .unwrap();
    write_snapshot(dir, name);
}

pub fn write_snapshot(dir: &Path, name: &str) {
    fs::write(dir.join(format!("{name}.json")), "{}").unwrap();
}

pub async fn table_exists(db: &Database, table: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_one(db.pool())
    .await
    .unwrap();
    count > 0
}

pub async fn ledger_entries(env: &TestEnv) -> Vec<LedgerEntry> {
    let mut conn = env.db().acquire().await.unwrap();
    env.ctx.ledger().entries(&mut conn).await.unwrap()
}

pub fn entry(name: &str, batch: i64) -> LedgerEntry {
    LedgerEntry {
        name: name.to_string(),
        batch,
    }
}
