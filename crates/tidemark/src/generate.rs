//! Migration and seed file generation.
//!
//! Generating a migration compares the newest snapshot on disk with the
//! schema the caller wants to reach. Working out the statements between two
//! snapshots is delegated to a [`SchemaDiff`] implementation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::dialect::Dialect;
use crate::error::{MigrateError, Result};
use crate::migration::{DOWN_MARKER, UP_MARKER};
use crate::store::{self, SNAPSHOT_EXTENSION};

/// Placeholder written into an empty migration section.
const BLANK_SECTION: &str = "-- Migration code";

/// A schema snapshot stored next to each migration.
///
/// The content is opaque to the migrator; only [`SchemaDiff`]
/// implementations interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    /// Wraps a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The snapshot of a schema with no tables.
    #[must_use]
    pub fn empty(dialect: Dialect) -> Self {
        Self(json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "prevId": "00000000-0000-0000-0000-000000000000",
            "version": "7",
            "dialect": dialect.tag(),
            "tables": {},
            "enums": {},
            "schemas": {},
            "_meta": {
                "columns": {},
                "schemas": {},
                "tables": {}
            }
        }))
    }

    /// Reads a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the snapshot as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Returns the JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Computes the statements that turn one schema into another.
pub trait SchemaDiff: Send + Sync {
    /// Returns the statements migrating `before` to `after`, in order.
    fn diff(&self, before: &Snapshot, after: &Snapshot) -> Result<Vec<String>>;
}

/// A diff that never finds changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiff;

impl SchemaDiff for NoDiff {
    fn diff(&self, _before: &Snapshot, _after: &Snapshot) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Options for [`generate_migration`].
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Label appended to the timestamp in the migration name.
    pub label: Option<String>,
    /// Schema to migrate to. Defaults to the newest snapshot on disk.
    pub target: Option<Snapshot>,
    /// Write the migration even when the diff is empty.
    pub allow_blank: bool,
    /// Append `CASCADE` to `DROP TABLE` statements of the down section.
    /// Only honoured on PostgreSQL.
    pub drop_cascade: bool,
}

/// Files written by [`generate_migration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMigration {
    /// Migration name.
    pub name: String,
    /// The `.sql` file.
    pub code: PathBuf,
    /// The `.json` snapshot.
    pub snapshot: PathBuf,
}

/// Builds a migration name from a timestamp and an optional label.
///
/// Characters other than letters, digits and `_` in the label become `_`.
#[must_use]
pub fn migration_name(now: DateTime<Utc>, label: Option<&str>) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
    match label.map(sanitize_label) {
        Some(label) if !label.is_empty() => format!("{timestamp}_{label}"),
        _ => timestamp,
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Converts a name to kebab case, splitting on case changes and separators.
#[must_use]
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower {
                out.push('-');
            }
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c.to_ascii_lowercase());
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Appends `CASCADE` to every `DROP TABLE` line that lacks it.
fn cascade_drops(sql: &str) -> String {
    sql.lines()
        .map(|line| {
            let upper = line.to_ascii_uppercase();
            if !upper.contains("DROP TABLE") || upper.contains("CASCADE") {
                line.to_string()
            } else if let Some(pos) = line.rfind(';') {
                format!("{} CASCADE{}", &line[..pos], &line[pos..])
            } else {
                format!("{line} CASCADE")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_migration(name: &str, up: &[String], down: &str) -> String {
    let up = if up.is_empty() {
        BLANK_SECTION.to_string()
    } else {
        up.join("\n")
    };
    let down = if down.is_empty() { BLANK_SECTION } else { down };
    format!("-- Migration: {name}\n{UP_MARKER}\n{up}\n\n{DOWN_MARKER}\n{down}\n")
}

/// Writes a new migration and its snapshot into `dir`.
pub fn generate_migration(
    dir: &Path,
    dialect: Dialect,
    differ: &dyn SchemaDiff,
    options: GenerateOptions,
) -> Result<GeneratedMigration> {
    std::fs::create_dir_all(dir)?;

    let name = migration_name(Utc::now(), options.label.as_deref());
    let code = dir.join(format!("{name}.sql"));
    let snapshot_path = dir.join(format!("{name}.{SNAPSHOT_EXTENSION}"));
    if code.exists() || snapshot_path.exists() {
        return Err(MigrateError::MigrationExists(code));
    }

    let before = match store::latest_snapshot(dir)? {
        Some(path) => Snapshot::load(&path)?,
        None => Snapshot::empty(dialect),
    };
    let after = options.target.unwrap_or_else(|| before.clone());

    let up = differ.diff(&before, &after)?;
    let down = differ.diff(&after, &before)?;
    if up.is_empty() && down.is_empty() && !options.allow_blank {
        return Err(MigrateError::NoSchemaChanges);
    }

    let mut down = down.join("\n");
    if options.drop_cascade {
        if dialect == Dialect::Postgres {
            down = cascade_drops(&down);
        } else {
            warn!(dialect = %dialect, "Drop cascade is only supported on PostgreSQL, ignoring");
        }
    }

    after.save(&snapshot_path)?;
    std::fs::write(&code, render_migration(&name, &up, &down))?;
    info!(path = %code.display(), "Migration created");

    Ok(GeneratedMigration {
        name,
        code,
        snapshot: snapshot_path,
    })
}

/// Writes a new SQL seeder template into `dir` and returns its path.
pub fn create_seed(dir: &Path, name: &str) -> Result<PathBuf> {
    let name = kebab_case(name);
    std::fs::create_dir_all(dir)?;

    if let Some(existing) = store::list_seed_files(dir)?
        .into_iter()
        .find(|seed| seed.name == name)
    {
        return Err(MigrateError::SeederExists(existing.path));
    }

    let path = dir.join(format!("{name}.sql"));
    std::fs::write(
        &path,
        format!("-- Seeder: {name}\n-- Implement seed logic here\n"),
    )?;
    info!(path = %path.display(), "Seeder created");
    Ok(path)
}
