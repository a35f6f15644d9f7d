//! Migration units.
//!
//! A migration is anything implementing [`Migration`]. Migrations written
//! in SQL are loaded from their code file at run time ([`SqlMigration`]);
//! migrations written in Rust are compiled into the binary and registered
//! by name in a [`MigrationRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::store::{CodeKind, MigrationFile};

/// Marker line opening the forward section of a SQL migration.
pub const UP_MARKER: &str = "-- migrate:up";

/// Marker line opening the backward section of a SQL migration.
pub const DOWN_MARKER: &str = "-- migrate:down";

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// A forward/backward pair of schema or data changes.
///
/// Both procedures receive the connection of the surrounding transaction.
/// They must not keep it beyond their own call.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Applies the migration.
    async fn up(&self, db: &mut AnyConnection) -> Result<()>;

    /// Reverts the migration.
    async fn down(&self, db: &mut AnyConnection) -> Result<()>;

    /// Returns whether the procedure for `direction` exists.
    ///
    /// The migrator refuses to run a migration whose procedure is missing.
    fn provides(&self, _direction: Direction) -> bool {
        true
    }
}

/// A migration defined by a `.sql` file.
///
/// The file holds a `-- migrate:up` section and a `-- migrate:down` section.
/// Comment lines may precede the first marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlMigration {
    up: Option<String>,
    down: Option<String>,
}

impl SqlMigration {
    /// Creates a SQL migration from its two sections.
    pub fn new(up: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            up: Some(up.into()),
            down: Some(down.into()),
        }
    }

    /// Reads and parses a SQL migration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source).map_err(|message| MigrateError::ParseError {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses the text of a SQL migration.
    pub fn parse(source: &str) -> std::result::Result<Self, String> {
        let mut migration = Self::default();
        let mut current: Option<Direction> = None;
        let mut buffer = String::new();

        for (index, line) in source.lines().enumerate() {
            let marker = line.trim().to_ascii_lowercase();
            let direction = if marker == UP_MARKER {
                Some(Direction::Up)
            } else if marker == DOWN_MARKER {
                Some(Direction::Down)
            } else {
                None
            };

            match direction {
                Some(direction) => {
                    migration.store(current, std::mem::take(&mut buffer));
                    if migration.section(direction).is_some() {
                        return Err(format!(
                            "line {}: duplicate `-- migrate:{direction}` marker",
                            index + 1
                        ));
                    }
                    current = Some(direction);
                    // Reserve the section so an empty one still counts as present.
                    *migration.section_mut(direction) = Some(String::new());
                }
                None => {
                    if current.is_none() && !is_blank_line(line) {
                        return Err(format!(
                            "line {}: statement before any `-- migrate:up` or `-- migrate:down` marker",
                            index + 1
                        ));
                    }
                    buffer.push_str(line);
                    buffer.push('\n');
                }
            }
        }
        migration.store(current, buffer);

        Ok(migration)
    }

    fn store(&mut self, direction: Option<Direction>, text: String) {
        if let Some(direction) = direction {
            *self.section_mut(direction) = Some(text.trim().to_string());
        }
    }

    fn section(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Up => self.up.as_deref(),
            Direction::Down => self.down.as_deref(),
        }
    }

    fn section_mut(&mut self, direction: Direction) -> &mut Option<String> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    async fn run(&self, db: &mut AnyConnection, direction: Direction) -> Result<()> {
        let Some(sql) = self.section(direction) else {
            return Err(MigrateError::custom(format!(
                "no `-- migrate:{direction}` section"
            )));
        };
        if is_blank_sql(sql) {
            debug!(%direction, "Section is blank, nothing to execute");
            return Ok(());
        }
        debug!(sql = %sql, "Executing SQL");
        sqlx::Executor::execute(&mut *db, sqlx::raw_sql(sql)).await?;
        Ok(())
    }
}

#[async_trait]
impl Migration for SqlMigration {
    async fn up(&self, db: &mut AnyConnection) -> Result<()> {
        self.run(db, Direction::Up).await
    }

    async fn down(&self, db: &mut AnyConnection) -> Result<()> {
        self.run(db, Direction::Down).await
    }

    fn provides(&self, direction: Direction) -> bool {
        self.section(direction).is_some()
    }
}

fn is_blank_line(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with("--")
}

/// Returns whether SQL text holds nothing but whitespace and line comments.
pub(crate) fn is_blank_sql(sql: &str) -> bool {
    sql.lines().all(is_blank_line)
}

/// Rust migrations compiled into the binary, keyed by migration name.
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    units: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration under the file stem of its code file.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, migration: impl Migration + 'static) -> Self {
        self.units.insert(name.into(), Arc::new(migration));
        self
    }

    /// Returns the migration registered as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Migration>> {
        self.units.get(name).cloned()
    }

    /// Returns the registered names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Returns the number of registered migrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Loads the migration described by a file on disk.
    pub fn load(&self, file: &MigrationFile) -> Result<Arc<dyn Migration>> {
        match file.kind {
            CodeKind::Sql => Ok(Arc::new(SqlMigration::from_file(&file.code)?)),
            CodeKind::Rust => self
                .get(&file.name)
                .ok_or_else(|| MigrateError::UnregisteredMigration(file.name.clone())),
        }
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_sections() {
        let migration = SqlMigration::parse(
            "-- create users\n\
             -- migrate:up\n\
             CREATE TABLE users (id INTEGER PRIMARY KEY);\n\
             \n\
             -- migrate:down\n\
             DROP TABLE users;\n",
        )
        .unwrap();

        assert_eq!(
            migration.section(Direction::Up),
            Some("CREATE TABLE users (id INTEGER PRIMARY KEY);")
        );
        assert_eq!(migration.section(Direction::Down), Some("DROP TABLE users;"));
        assert!(migration.provides(Direction::Up));
        assert!(migration.provides(Direction::Down));
    }

    #[test]
    fn test_parse_missing_down() {
        let migration = SqlMigration::parse("-- migrate:up\nSELECT 1;\n").unwrap();
        assert!(migration.provides(Direction::Up));
        assert!(!migration.provides(Direction::Down));
    }

    #[test]
    fn test_parse_blank_section_is_present() {
        let migration =
            SqlMigration::parse("-- migrate:up\n-- Migration code\n-- migrate:down\n").unwrap();
        assert!(migration.provides(Direction::Up));
        assert!(migration.provides(Direction::Down));
        assert!(is_blank_sql(migration.section(Direction::Up).unwrap()));
    }

    #[test]
    fn test_parse_markers_case_insensitive() {
        let migration = SqlMigration::parse("  -- MIGRATE:UP\nSELECT 1;\n").unwrap();
        assert_eq!(migration.section(Direction::Up), Some("SELECT 1;"));
    }

    #[test]
    fn test_parse_rejects_statement_before_marker() {
        let err = SqlMigration::parse("SELECT 1;\n-- migrate:up\n").unwrap_err();
        assert!(err.contains("line 1"));
    }

    #[test]
    fn test_parse_rejects_duplicate_marker() {
        let err = SqlMigration::parse("-- migrate:up\n-- migrate:up\n").unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_registry_load_unregistered_rust() {
        let registry = MigrationRegistry::new();
        let file = MigrationFile {
            name: "20240101_000000_init".to_string(),
            code: "migrations/20240101_000000_init.rs".into(),
            snapshot: "migrations/20240101_000000_init.json".into(),
            kind: CodeKind::Rust,
        };

        let result = registry.load(&file);
        assert!(matches!(result, Err(MigrateError::UnregisteredMigration(name)) if name == file.name));
    }

    #[test]
    fn test_registry_register() {
        let registry = MigrationRegistry::new()
            .register("20240102_000000_b", SqlMigration::new("SELECT 1", "SELECT 2"))
            .register("20240101_000000_a", SqlMigration::new("SELECT 1", "SELECT 2"));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["20240101_000000_a", "20240102_000000_b"]
        );
        assert!(registry.get("20240101_000000_a").is_some());
    }
}
