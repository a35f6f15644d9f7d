//! Migration and seed file discovery.
//!
//! Migrations are stored as file pairs: a code file (`.sql` or `.rs`) and a
//! `.json` schema snapshot with the same stem. Seeds are single code files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// Extension of the schema snapshot paired with each migration.
pub const SNAPSHOT_EXTENSION: &str = "json";

/// Code file extensions that define migration and seed units.
pub const CODE_EXTENSIONS: &[&str] = &["sql", "rs"];

/// How a unit's code file is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// A SQL file, loaded at run time.
    Sql,
    /// A Rust file, compiled in and looked up in a registry.
    Rust,
}

impl CodeKind {
    /// Maps a file extension to a code kind.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "sql" => Some(Self::Sql),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }
}

/// A migration unit found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Migration name (the shared file stem).
    pub name: String,
    /// Code file path.
    pub code: PathBuf,
    /// Snapshot file path.
    pub snapshot: PathBuf,
    /// Code file kind.
    pub kind: CodeKind,
}

/// A seed unit found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFile {
    /// Seeder name (the file stem).
    pub name: String,
    /// Code file path.
    pub path: PathBuf,
    /// Code file kind.
    pub kind: CodeKind,
}

/// A directory entry split into stem and extension.
struct Entry {
    stem: String,
    ext: String,
    path: PathBuf,
}

/// Lists the regular files directly inside `dir`, skipping hidden files
/// and `mod.rs` module declarations.
fn read_entries(dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') || file_name == "mod.rs" {
            continue;
        }
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        entries.push(Entry {
            stem: stem.to_string_lossy().into_owned(),
            ext: ext.to_string_lossy().into_owned(),
            path,
        });
    }
    Ok(entries)
}

/// Lists migration units in `dir`, oldest first.
///
/// The order is the apply order; rollback walks it in reverse.
pub fn list_migration_files(dir: &Path) -> Result<Vec<MigrationFile>> {
    if !dir.is_dir() {
        return Err(MigrateError::MigrationsDirNotFound(dir.to_path_buf()));
    }

    let mut code: BTreeMap<String, (PathBuf, CodeKind)> = BTreeMap::new();
    let mut snapshots: BTreeMap<String, PathBuf> = BTreeMap::new();

    for entry in read_entries(dir)? {
        if entry.ext == SNAPSHOT_EXTENSION {
            snapshots.insert(entry.stem, entry.path);
        } else if let Some(kind) = CodeKind::from_extension(&entry.ext) {
            if code.contains_key(&entry.stem) {
                return Err(MigrateError::DuplicateMigration(entry.stem));
            }
            code.insert(entry.stem, (entry.path, kind));
        }
    }

    if let Some((_, orphan)) = snapshots.iter().find(|(stem, _)| !code.contains_key(*stem)) {
        return Err(MigrateError::OrphanSnapshot(orphan.clone()));
    }

    code.into_iter()
        .map(|(name, (code, kind))| {
            let snapshot = snapshots
                .remove(&name)
                .ok_or_else(|| MigrateError::MissingSnapshot(code.clone()))?;
            Ok(MigrationFile {
                name,
                code,
                snapshot,
                kind,
            })
        })
        .collect()
}

/// Returns the newest snapshot in `dir`, if any.
pub fn latest_snapshot(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    Ok(read_entries(dir)?
        .into_iter()
        .filter(|entry| entry.ext == SNAPSHOT_EXTENSION)
        .max_by(|a, b| a.stem.cmp(&b.stem))
        .map(|entry| entry.path))
}

/// Lists seed units in `dir`, ordered by name.
pub fn list_seed_files(dir: &Path) -> Result<Vec<SeedFile>> {
    if !dir.is_dir() {
        return Err(MigrateError::SeedDirNotFound(dir.to_path_buf()));
    }

    let mut seeds: Vec<SeedFile> = read_entries(dir)?
        .into_iter()
        .filter_map(|entry| {
            CodeKind::from_extension(&entry.ext).map(|kind| SeedFile {
                name: entry.stem,
                path: entry.path,
                kind,
            })
        })
        .collect();
    seeds.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");

        assert!(matches!(
            list_migration_files(&missing),
            Err(MigrateError::MigrationsDirNotFound(path)) if path == missing
        ));
        assert!(matches!(
            list_seed_files(&missing),
            Err(MigrateError::SeedDirNotFound(_))
        ));
    }

    #[test]
    fn test_empty_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_migration_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_sorted_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        // Created newest first on purpose.
        for name in ["20240301_000000_c", "20240101_000000_a", "20240201_000000_b"] {
            touch(tmp.path(), &format!("{name}.sql"));
            touch(tmp.path(), &format!("{name}.json"));
        }

        let files = list_migration_files(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["20240101_000000_a", "20240201_000000_b", "20240301_000000_c"]
        );
        assert_eq!(files[0].kind, CodeKind::Sql);
        assert_eq!(files[0].snapshot, tmp.path().join("20240101_000000_a.json"));
    }

    #[test]
    fn test_rust_and_sql_units() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "20240101_000000_a.rs");
        touch(tmp.path(), "20240101_000000_a.json");
        touch(tmp.path(), "20240102_000000_b.sql");
        touch(tmp.path(), "20240102_000000_b.json");
        touch(tmp.path(), "mod.rs");
        touch(tmp.path(), "README.md");
        touch(tmp.path(), ".hidden.sql");

        let files = list_migration_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].kind, CodeKind::Rust);
        assert_eq!(files[1].kind, CodeKind::Sql);
    }

    #[test]
    fn test_code_without_snapshot_is_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "20240101_000000_a.sql");

        assert!(matches!(
            list_migration_files(tmp.path()),
            Err(MigrateError::MissingSnapshot(path)) if path.ends_with("20240101_000000_a.sql")
        ));
    }

    #[test]
    fn test_snapshot_without_code_is_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "20240101_000000_a.json");

        assert!(matches!(
            list_migration_files(tmp.path()),
            Err(MigrateError::OrphanSnapshot(_))
        ));
    }

    #[test]
    fn test_duplicate_code_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "20240101_000000_a.sql");
        touch(tmp.path(), "20240101_000000_a.rs");
        touch(tmp.path(), "20240101_000000_a.json");

        assert!(matches!(
            list_migration_files(tmp.path()),
            Err(MigrateError::DuplicateMigration(name)) if name == "20240101_000000_a"
        ));
    }

    #[test]
    fn test_latest_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(latest_snapshot(tmp.path()).unwrap(), None);

        touch(tmp.path(), "20240101_000000_a.json");
        touch(tmp.path(), "20240301_000000_c.json");
        touch(tmp.path(), "20240201_000000_b.json");

        assert_eq!(
            latest_snapshot(tmp.path()).unwrap(),
            Some(tmp.path().join("20240301_000000_c.json"))
        );
    }

    #[test]
    fn test_seed_files_without_pairing() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "db-seeder.rs");
        touch(tmp.path(), "admin-seeder.sql");
        touch(tmp.path(), "notes.txt");

        let seeds = list_seed_files(tmp.path()).unwrap();
        let names: Vec<_> = seeds.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["admin-seeder", "db-seeder"]);
        assert_eq!(seeds[0].kind, CodeKind::Sql);
    }
}
