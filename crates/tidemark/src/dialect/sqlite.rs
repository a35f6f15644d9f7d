//! SQLite dialect for the ledger.

use super::{LedgerDialect, LedgerTable};

/// SQLite ledger dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LedgerDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ledger_exists_sql(&self, table: &LedgerTable) -> (String, Vec<String>) {
        (
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?".to_string(),
            vec![table.name.clone()],
        )
    }
}
