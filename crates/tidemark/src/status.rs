//! Migration status reporting.

use std::fmt;

/// Whether a migration has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Recorded in the ledger.
    Completed,
    /// Not yet applied.
    Pending,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// Status of one migration on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migration name.
    pub name: String,
    /// Batch the migration was applied in, if it is applied.
    pub batch: Option<i64>,
}

impl MigrationStatus {
    /// Creates a status row.
    pub fn new(name: impl Into<String>, batch: Option<i64>) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// Returns the state implied by the batch.
    #[must_use]
    pub fn state(&self) -> MigrationState {
        if self.batch.is_some() {
            MigrationState::Completed
        } else {
            MigrationState::Pending
        }
    }
}

/// Renders status rows as a text table.
#[must_use]
pub fn render_table(rows: &[MigrationStatus]) -> String {
    const HEADERS: [&str; 3] = ["name", "status", "batch"];

    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|row| {
            [
                row.name.clone(),
                row.state().to_string(),
                row.batch.map(|b| b.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |values: [&str; 3]| {
        format!(
            " {:<w0$} | {:<w1$} | {:<w2$}",
            values[0],
            values[1],
            values[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )
        .trim_end()
        .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(HEADERS));
    out.push('\n');
    out.push_str(&format!(
        "-{}-+-{}-+-{}-\n",
        "-".repeat(widths[0]),
        "-".repeat(widths[1]),
        "-".repeat(widths[2])
    ));
    for row in &cells {
        out.push_str(&line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
        out.push('\n');
    }
    out
}
