//! MySQL dialect for the ledger.

use super::{LedgerDialect, LedgerTable};

/// MySQL ledger dialect.
///
/// Identifiers are quoted with backticks since double quotes only work
/// under `ANSI_QUOTES`. The `name` column is a `VARCHAR` because MySQL
/// refuses an unbounded `TEXT` primary key.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LedgerDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn name_column_type(&self) -> &'static str {
        "VARCHAR(255)"
    }

    fn ledger_exists_sql(&self, table: &LedgerTable) -> (String, Vec<String>) {
        (
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
                .to_string(),
            vec![table.name.clone()],
        )
    }
}
