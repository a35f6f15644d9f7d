//! PostgreSQL dialect for the ledger.
//!
//! PostgreSQL is the only supported dialect with real namespaces, so the
//! ledger table is created inside the configured schema.

use super::{LedgerDialect, LedgerTable};

/// PostgreSQL ledger dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LedgerDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn supports_schemas(&self) -> bool {
        true
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn ledger_exists_sql(&self, table: &LedgerTable) -> (String, Vec<String>) {
        // An unqualified ledger lives wherever `search_path` put it.
        match &table.schema {
            Some(schema) => (
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2"
                    .to_string(),
                vec![schema.clone(), table.name.clone()],
            ),
            None => (
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
                    .to_string(),
                vec![table.name.clone()],
            ),
        }
    }
}
