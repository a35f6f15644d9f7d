//! Transactional seeder execution.

use std::path::Path;

use tracing::info;

use super::{SeedContext, SeedRegistry, SeedState, Seeder};
use crate::database::Database;
use crate::error::{MigrateError, Result};
use crate::store;

/// Runs seeders, each top-level run inside its own transaction.
#[derive(Debug, Clone)]
pub struct SeedRunner {
    db: Database,
    registry: SeedRegistry,
}

impl SeedRunner {
    /// Creates a runner over a database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            registry: SeedRegistry::new(),
        }
    }

    /// Sets the registry Rust seeders are resolved from.
    #[must_use]
    pub fn with_registry(mut self, registry: SeedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Runs `seeder` with `state` and returns the state it left behind.
    ///
    /// Everything the seeder and its sub-seeders write is rolled back if
    /// any of them fails.
    pub async fn run(&self, seeder: Box<dyn Seeder>, state: SeedState) -> Result<SeedState> {
        let name = seeder.name().to_string();
        info!(name = %name, "Running seeder");

        let failed_name = name.clone();
        let state = self
            .db
            .transaction(move |conn| {
                Box::pin(async move {
                    let mut state = state;
                    let mut ctx = SeedContext::new(conn, &mut state);
                    seeder
                        .seed(&mut ctx)
                        .await
                        .map_err(|err| MigrateError::SeedFailed {
                            name: failed_name,
                            source: Box::new(err),
                        })?;
                    Ok::<_, MigrateError>(state)
                })
            })
            .await?;

        info!(name = %name, "Seeder completed");
        Ok(state)
    }

    /// Finds the seed file called `name` in `dir` and runs it with an empty state.
    ///
    /// Returns `None` when the directory holds no seed files at all.
    pub async fn run_named(&self, dir: &Path, name: &str) -> Result<Option<SeedState>> {
        let files = store::list_seed_files(dir)?;
        if files.is_empty() {
            info!("No seeders to run");
            return Ok(None);
        }

        let file = files
            .iter()
            .find(|file| file.name == name)
            .ok_or_else(|| MigrateError::SeederNotFound(name.to_string()))?;
        let seeder = self.registry.load(file)?;

        self.run(seeder, SeedState::new()).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::seed::seeder;
    use async_trait::async_trait;

    async fn create_test_db() -> Database {
        let db = Database::connect(Dialect::Sqlite, "sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite database");
        db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
            .await
            .unwrap();
        db
    }

    async fn user_count(db: &Database) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[derive(Default)]
    struct AdminSeeder;

    #[async_trait]
    impl Seeder for AdminSeeder {
        async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
            sqlx::query("INSERT INTO users (name) VALUES ('admin')")
                .execute(ctx.db())
                .await?;
            ctx.state_mut().insert("admin", "admin")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct EditorSeeder;

    #[async_trait]
    impl Seeder for EditorSeeder {
        async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
            let Some(admin) = ctx.state().get_as::<String>("admin")? else {
                return Err(MigrateError::custom("admin must be seeded first"));
            };
            sqlx::query("INSERT INTO users (name) VALUES ('editor')")
                .execute(ctx.db())
                .await?;
            ctx.state_mut().insert("editor_created_by", admin)?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct DbSeeder;

    #[async_trait]
    impl Seeder for DbSeeder {
        async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
            ctx.call(&[seeder::<AdminSeeder>, seeder::<EditorSeeder>])
                .await
        }
    }

    #[derive(Default)]
    struct BrokenSeeder;

    #[async_trait]
    impl Seeder for BrokenSeeder {
        async fn seed(&self, ctx: &mut SeedContext<'_>) -> Result<()> {
            ctx.call(&[seeder::<AdminSeeder>]).await?;
            Err(MigrateError::custom("boom"))
        }
    }

    #[tokio::test]
    async fn test_sub_seeders_share_state() {
        let db = create_test_db().await;
        let runner = SeedRunner::new(db.clone());

        let mut initial = SeedState::new();
        initial.insert("tenant", 7).unwrap();

        let state = runner.run(seeder::<DbSeeder>(), initial).await.unwrap();

        assert_eq!(state.get_as::<i64>("tenant").unwrap(), Some(7));
        assert_eq!(
            state.get_as::<String>("editor_created_by").unwrap(),
            Some("admin".to_string())
        );
        assert_eq!(user_count(&db).await, 2);
    }

    #[tokio::test]
    async fn test_failure_rolls_back() {
        let db = create_test_db().await;
        let runner = SeedRunner::new(db.clone());

        let err = runner
            .run(seeder::<BrokenSeeder>(), SeedState::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::SeedFailed { ref name, .. } if name == "BrokenSeeder"));
        assert_eq!(user_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_run_named() {
        let db = create_test_db().await;
        let tmp = tempfile::tempdir().unwrap();
        let runner = SeedRunner::new(db.clone())
            .with_registry(SeedRegistry::new().register("db-seeder", seeder::<DbSeeder>));

        assert!(runner.run_named(tmp.path(), "db-seeder").await.unwrap().is_none());

        std::fs::write(tmp.path().join("db-seeder.rs"), "").unwrap();
        std::fs::write(
            tmp.path().join("guest-seeder.sql"),
            "INSERT INTO users (name) VALUES ('guest');",
        )
        .unwrap();

        assert!(matches!(
            runner.run_named(tmp.path(), "missing").await,
            Err(MigrateError::SeederNotFound(name)) if name == "missing"
        ));

        runner.run_named(tmp.path(), "db-seeder").await.unwrap();
        runner.run_named(tmp.path(), "guest-seeder").await.unwrap();
        assert_eq!(user_count(&db).await, 3);
    }
}
