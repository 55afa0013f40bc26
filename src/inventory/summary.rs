//! Condensed, human-readable view of an inventory artifact

use colored::Colorize;
use serde::Serialize;

use super::Inventory;
use crate::utils::format_count;

/// Columns listed per table before truncating
pub const MAX_LISTED_COLUMNS: usize = 10;

#[derive(Debug, Serialize)]
pub struct InventorySummary {
    pub dataset_count: usize,
    pub datasets: Vec<DatasetSummary>,
}

#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub dataset_id: String,
    pub table_count: usize,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Serialize)]
pub struct TableSummary {
    pub table_id: String,
    pub num_rows: u64,
    pub size_mb: f64,
    pub column_count: usize,
    /// `name: TYPE` for the first [`MAX_LISTED_COLUMNS`] columns
    pub columns: Vec<String>,
    pub omitted_columns: usize,
}

pub fn summarize(inventory: &Inventory) -> InventorySummary {
    let datasets = inventory
        .values()
        .map(|ds| DatasetSummary {
            dataset_id: ds.dataset_id.clone(),
            table_count: ds.tables.len(),
            tables: ds
                .tables
                .iter()
                .map(|t| TableSummary {
                    table_id: t.table_id.clone(),
                    num_rows: t.num_rows,
                    size_mb: t.size_mb,
                    column_count: t.columns.len(),
                    columns: t
                        .columns
                        .iter()
                        .take(MAX_LISTED_COLUMNS)
                        .map(|c| format!("{}: {}", c.name, c.column_type))
                        .collect(),
                    omitted_columns: t.columns.len().saturating_sub(MAX_LISTED_COLUMNS),
                })
                .collect(),
        })
        .collect();

    InventorySummary {
        dataset_count: inventory.len(),
        datasets,
    }
}

fn rule() -> String {
    "=".repeat(80)
}

/// Render the summary for the terminal
pub fn render_summary(summary: &InventorySummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", rule()));
    out.push_str(&format!("{}\n", "Warehouse structure summary".bold()));
    out.push_str(&format!("{}\n", rule()));
    out.push_str(&format!("\nDatasets: {}\n", summary.dataset_count));

    for ds in &summary.datasets {
        out.push_str(&format!("\n{}\n", rule()));
        out.push_str(&format!("{} Dataset: {}\n", "📊", ds.dataset_id.cyan().bold()));
        out.push_str(&format!("{}\n", rule()));
        out.push_str(&format!("  Tables: {}\n", ds.table_count));

        for t in &ds.tables {
            out.push_str(&format!("\n  {} Table: {}\n", "📋", t.table_id.bold()));
            out.push_str(&format!("     - Rows: {}\n", format_count(t.num_rows as i64)));
            out.push_str(&format!("     - Size: {:.2} MB\n", t.size_mb));
            out.push_str(&format!("     - Columns: {}\n", t.column_count));
            out.push_str("     - Key columns:\n");
            for col in &t.columns {
                out.push_str(&format!("       • {}\n", col));
            }
            if t.omitted_columns > 0 {
                out.push_str(&format!("       ... {} more columns\n", t.omitted_columns));
            }
        }
    }

    out.push_str(&format!("\n{}\n", rule()));
    out.push_str(&format!("{}\n", "Tables by dataset".bold()));
    out.push_str(&format!("{}\n", rule()));
    for ds in &summary.datasets {
        out.push_str(&format!("\n{}:\n", ds.dataset_id));
        for (i, t) in ds.tables.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, t.table_id));
        }
    }

    out
}
