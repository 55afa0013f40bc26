//! Output formatting module for CLI display
//!
//! Terminal rendering for scan progress, journal entries and scheduled-query
//! registration, kept apart from the operations that produce the data.

use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use ecops::accounting::{JournalEntry, JournalEntryId};
use ecops::inventory::{ScanEvent, TableInventory};
use ecops::period::YearMonth;
use ecops::scheduler::{PlannedAction, RegistrationOutcome, RegistrationPlan, ScheduledJob, TransferConfig};
use ecops::utils::format_count;

fn rule() -> String {
    "=".repeat(80)
}

/// One progress line block for `inventory scan`
pub fn format_scan_event(event: &ScanEvent<'_>) -> String {
    match event {
        ScanEvent::DatasetCount(n) => format!("{} Found {} datasets\n", "✓".green().bold(), n),
        ScanEvent::Dataset {
            dataset_id,
            table_count,
        } => {
            let mut out = format!("\n{}\n{} Dataset: {}\n{}\n", rule(), "📊", dataset_id.cyan().bold(), rule());
            if *table_count == 0 {
                out.push_str("  (no tables)\n");
            } else {
                out.push_str(&format!("  Tables: {}\n", table_count));
            }
            out
        }
        ScanEvent::Table { table, .. } => format_table_details(table),
    }
}

fn format_table_details(table: &TableInventory) -> String {
    let mut out = format!("\n  {} Table: {}\n", "📋", table.table_id.bold());
    out.push_str(&format!("     - Rows: {}\n", format_count(table.num_rows as i64)));
    out.push_str(&format!("     - Size: {:.2} MB\n", table.size_mb));
    out.push_str(&format!(
        "     - Created: {}\n",
        table.created.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!(
        "     - Modified: {}\n",
        table.modified.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!("     - Columns ({}):\n", table.columns.len()));
    for col in &table.columns {
        out.push_str(&format!("       • {}\n", col.describe()));
    }

    if let Some(err) = &table.sample_error {
        out.push_str(&format!("     {} Sample query failed: {}\n", "⚠".yellow(), err));
    } else if !table.sample_rows.is_empty() {
        out.push_str(&format!("     - Sample rows ({}):\n", table.sample_rows.len()));
        for row in &table.sample_rows {
            out.push_str(&format!("       {}\n", compact_json(row)));
        }
    }
    out
}

fn compact_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// `action` names what is skipped, e.g. "nothing to scan"
pub fn format_missing_credentials(action: &str) -> String {
    format!(
        "{} GOOGLE_APPLICATION_CREDENTIALS is not set; {}.\n",
        "ℹ".blue().bold(),
        action
    )
}

pub fn format_no_datasets(project_id: &str) -> String {
    format!(
        "{} No datasets found in project {}. Check the project id and permissions.\n",
        "ℹ".blue().bold(),
        project_id
    )
}

pub fn format_journal_preview(month: YearMonth, entry: &JournalEntry) -> String {
    format!(
        "Preparing Journal Entry for {} (Date: {})",
        month,
        entry.issue_date.format("%Y-%m-%d")
    )
}

/// Entry description followed by what happened to it
pub fn format_journal_result(entry: &JournalEntry, id: JournalEntryId) -> String {
    match id {
        JournalEntryId::DryRun => format!("{}\n>> DRY RUN: skipping API call.", entry),
        JournalEntryId::Posted(id) => format!("{}\nPosted manual journal {}", entry, id),
    }
}

pub fn format_no_cogs(month: YearMonth) -> String {
    format!("No COGS found for {}.", month)
}

/// Definition header followed by the SQL
pub fn format_job_definition(job: ScheduledJob, config: &TransferConfig, parent: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", "Job:".bold(), job.key()));
    out.push_str(&format!("{} {}\n", "Display name:".bold(), config.display_name));
    out.push_str(&format!("{} {}\n", "Parent:".bold(), parent));
    out.push_str(&format!("{} {}\n", "Data source:".bold(), config.data_source_id));
    out.push_str(&format!(
        "{} {}\n",
        "Destination dataset:".bold(),
        config.destination_dataset_id
    ));
    out.push_str(&format!("{} {} (UTC)\n", "Schedule:".bold(), config.schedule));
    out.push_str(&format!("\n{}\n", config.params.query));
    out
}

pub fn format_plan(job: ScheduledJob, plan: &RegistrationPlan) -> String {
    let action = match &plan.action {
        PlannedAction::Create => "would create".to_string(),
        PlannedAction::Update { name, fields } => {
            format!("would update {} ({})", name, fields.join(", "))
        }
        PlannedAction::Unchanged { name } => format!("unchanged: {}", name),
    };
    let mut out = format!("{} {}: {}\n", "ℹ".blue().bold(), job.key(), action);
    for duplicate in &plan.duplicates {
        out.push_str(&format!("  {} duplicate left untouched: {}\n", "⚠".yellow(), duplicate));
    }
    out
}

#[derive(Tabled)]
struct RegistrationRow {
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Resource")]
    resource: String,
}

pub fn format_registration_table(results: &[(ScheduledJob, RegistrationOutcome)]) -> String {
    let rows: Vec<RegistrationRow> = results
        .iter()
        .map(|(job, outcome)| {
            let (result, resource) = match outcome {
                RegistrationOutcome::Created(c) => (
                    outcome.label().green().to_string(),
                    c.name.clone().unwrap_or_default(),
                ),
                RegistrationOutcome::Updated { config, fields } => (
                    format!("{} ({})", outcome.label(), fields.join(", ")).yellow().to_string(),
                    config.name.clone().unwrap_or_default(),
                ),
                RegistrationOutcome::Unchanged(name) => (outcome.label().to_string(), name.clone()),
            };
            RegistrationRow {
                job: job.key().to_string(),
                result,
                schedule: job.schedule().to_string(),
                resource,
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}
