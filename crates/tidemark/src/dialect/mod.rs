//! Database dialect implementations.
//!
//! Each dialect knows how to quote identifiers, bind parameters and lay out
//! the ledger table for its database system. Everything above this module
//! stays dialect-agnostic.

mod mysql;
mod postgres;
mod sqlite;

use std::fmt;
use std::str::FromStr;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::error::MigrateError;

/// Dialect tag as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Returns the SQL generator for this dialect.
    #[must_use]
    pub fn sql(self) -> &'static dyn LedgerDialect {
        match self {
            Self::Postgres => &PostgresDialect,
            Self::MySql => &MySqlDialect,
            Self::Sqlite => &SqliteDialect,
        }
    }

    /// Returns the configuration tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns whether a database URL scheme belongs to this dialect.
    #[must_use]
    pub fn accepts_scheme(self, scheme: &str) -> bool {
        match self {
            Self::Postgres => matches!(scheme, "postgres" | "postgresql"),
            Self::MySql => matches!(scheme, "mysql" | "mariadb"),
            Self::Sqlite => scheme == "sqlite",
        }
    }
}

impl FromStr for Dialect {
    type Err = MigrateError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(MigrateError::UnsupportedDialect(tag.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Location of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTable {
    /// Table name.
    pub name: String,
    /// Schema (namespace) name. Only PostgreSQL honours it.
    pub schema: Option<String>,
}

impl LedgerTable {
    /// Default ledger table name.
    pub const DEFAULT_NAME: &'static str = "tidemark_migrations";

    /// Default ledger schema.
    pub const DEFAULT_SCHEMA: &'static str = "public";

    /// Creates a ledger table location.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    /// Places the table in a schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME).in_schema(Self::DEFAULT_SCHEMA)
    }
}

/// Trait for database-specific ledger SQL.
pub trait LedgerDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns whether the dialect has schemas (namespaces) for tables.
    fn supports_schemas(&self) -> bool {
        false
    }

    /// Quote an identifier (table name, schema name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Returns the bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Column type of the ledger's `name` column.
    fn name_column_type(&self) -> &'static str {
        "TEXT"
    }

    /// Returns the schema the ledger lives in, if this dialect honours it.
    fn effective_schema<'t>(&self, table: &'t LedgerTable) -> Option<&'t str> {
        if self.supports_schemas() {
            table.schema.as_deref()
        } else {
            None
        }
    }

    /// Returns the fully qualified, quoted ledger table name.
    fn qualified_table(&self, table: &LedgerTable) -> String {
        match self.effective_schema(table) {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(&table.name)
            ),
            None => self.quote_identifier(&table.name),
        }
    }

    /// Generates SQL creating the ledger schema, when the dialect has one.
    fn create_schema_sql(&self, table: &LedgerTable) -> Option<String> {
        self.effective_schema(table)
            .map(|schema| format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote_identifier(schema)))
    }

    /// Generates SQL creating the ledger table if absent.
    fn create_ledger_sql(&self, table: &LedgerTable) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (name {} PRIMARY KEY, batch INTEGER NOT NULL)",
            self.qualified_table(table),
            self.name_column_type()
        )
    }

    /// Generates a query returning a row when the ledger table exists,
    /// together with the values to bind in order.
    fn ledger_exists_sql(&self, table: &LedgerTable) -> (String, Vec<String>);
}
