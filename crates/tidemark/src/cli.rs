//! Command-line interface.
//!
//! The `tidemark` binary runs [`run`] with empty registries, so it only
//! knows about SQL migrations and seeders. Applications with Rust units
//! embed the CLI in their own binary:
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let migrations = MigrationRegistry::new().register("20240101_000000_init", Init);
//!     let seeds = SeedRegistry::new().register("db-seeder", seeder::<DbSeeder>);
//!     tidemark::cli::run(Cli::parse(), migrations, seeds).await?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{self, Settings};
use crate::context::MigrationContext;
use crate::error::Result;
use crate::generate::{self, GenerateOptions, NoDiff, SchemaDiff, Snapshot};
use crate::migration::MigrationRegistry;
use crate::migrator::Migrator;
use crate::seed::{SeedRegistry, SeedRunner};
use crate::status::render_table;

/// Batch-tracked database migrations and seeders.
#[derive(Debug, Parser)]
#[command(name = "tidemark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file. Searched for upwards from the working directory if not given.
    #[arg(short, long, env = "TIDEMARK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the configuration file.
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a new migration from schema changes.
    Generate {
        /// Migration label, appended to the timestamp.
        #[arg(short, long)]
        name: String,

        /// Snapshot of the schema to migrate to.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Create a blank migration when no changes are detected.
        #[arg(short, long)]
        force: bool,

        /// Force all dropped tables to cascade. Only for PostgreSQL.
        #[arg(long)]
        drop_cascade: bool,
    },

    /// Apply pending migrations as a new batch.
    Up,

    /// Roll back the latest batch, or every batch from `--batch` upwards.
    Down {
        /// Lowest batch to roll back.
        #[arg(short, long)]
        batch: Option<i64>,
    },

    /// Show migration status.
    Status,

    /// Roll back every migration.
    Fresh,

    /// Roll back every migration, then apply them all again.
    Refresh,

    /// Create a new seeder.
    #[command(name = "seed:create")]
    SeedCreate {
        /// Seeder name. Defaults to the configured default seeder.
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Run a seeder.
    #[command(name = "seed:run")]
    SeedRun {
        /// Seeder name. Defaults to the configured default seeder.
        #[arg(short, long)]
        name: Option<String>,
    },
}

/// Runs a parsed command line with the given Rust units.
pub async fn run(cli: Cli, migrations: MigrationRegistry, seeds: SeedRegistry) -> Result<()> {
    run_with_diff(cli, migrations, seeds, &NoDiff).await
}

/// Like [`run`], with a schema diff used by `generate`.
pub async fn run_with_diff(
    cli: Cli,
    migrations: MigrationRegistry,
    seeds: SeedRegistry,
    differ: &dyn SchemaDiff,
) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config::discover(&std::env::current_dir()?)?,
    };
    let settings = Settings::load(&config_path, cli.database_url)?;

    match cli.command {
        Command::Generate {
            name,
            snapshot,
            force,
            drop_cascade,
        } => {
            let target = snapshot.as_deref().map(Snapshot::load).transpose()?;
            generate::generate_migration(
                &settings.migrations_dir,
                settings.dialect,
                differ,
                GenerateOptions {
                    label: Some(name),
                    target,
                    allow_blank: force,
                    drop_cascade,
                },
            )?;
        }

        Command::SeedCreate { name } => {
            let seed = settings.seed()?;
            let name = name.unwrap_or_else(|| seed.default_seeder.clone());
            generate::create_seed(&seed.dir, &name)?;
        }

        Command::SeedRun { name } => {
            let seed = settings.seed()?;
            let name = generate::kebab_case(name.as_deref().unwrap_or(&seed.default_seeder));
            let ctx = MigrationContext::connect(&settings).await?;

            let runner = SeedRunner::new(ctx.database.clone()).with_registry(seeds);
            runner.run_named(&seed.dir, &name).await?;
        }

        Command::Up => {
            migrator(&settings, migrations).await?.up().await?;
        }

        Command::Down { batch } => {
            migrator(&settings, migrations).await?.down(batch).await?;
        }

        Command::Fresh => {
            migrator(&settings, migrations).await?.fresh().await?;
        }

        Command::Refresh => {
            migrator(&settings, migrations).await?.refresh().await?;
        }

        Command::Status => {
            let rows = migrator(&settings, migrations).await?.status().await?;
            if rows.is_empty() {
                info!("No migrations found");
            } else {
                println!();
                print!("{}", render_table(&rows));
                println!();
            }
        }
    }

    Ok(())
}

async fn migrator(settings: &Settings, registry: MigrationRegistry) -> Result<Migrator> {
    let ctx = MigrationContext::connect(settings).await?;
    Ok(Migrator::new(&ctx).with_registry(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_down_with_batch() {
        let cli = Cli::try_parse_from(["tidemark", "down", "--batch", "2"]).unwrap();
        assert!(matches!(cli.command, Command::Down { batch: Some(2) }));
    }

    #[test]
    fn test_parse_seed_commands() {
        let cli = Cli::try_parse_from(["tidemark", "seed:run", "--name", "admin-seeder"]).unwrap();
        assert!(matches!(cli.command, Command::SeedRun { name: Some(ref n) } if n == "admin-seeder"));

        let cli = Cli::try_parse_from(["tidemark", "seed:create"]).unwrap();
        assert!(matches!(cli.command, Command::SeedCreate { name: None }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tidemark",
            "status",
            "--config",
            "app/tidemark.toml",
            "--database-url",
            "sqlite::memory:",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("app/tidemark.toml")));
        assert_eq!(cli.database_url.as_deref(), Some("sqlite::memory:"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "tidemark",
            "generate",
            "--name",
            "add posts",
            "--force",
            "--drop-cascade",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Generate { force: true, drop_cascade: true, snapshot: None, ref name } if name == "add posts"
        ));
    }

    #[test]
    fn test_generate_requires_name() {
        let err = Cli::try_parse_from(["tidemark", "generate", "--force"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
