use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use super::AppContext;
use crate::cli::formatters::{format_journal_preview, format_journal_result, format_no_cogs};
use crate::cli::CogsCommands;
use ecops::accounting::cogs_sync::{sync_month, SyncOutcome};
use ecops::accounting::freee::FreeeClient;
use ecops::accounting::{DryRunPoster, JournalAccounts, JournalEntryId, JournalPoster};
use ecops::error::OpsError;
use ecops::period::YearMonth;
use ecops::transforms::sql::WarehouseTables;
use ecops::warehouse::{BigQueryClient, Warehouse};

fn target_month(arg: Option<&str>) -> Result<YearMonth> {
    match arg {
        Some(raw) => Ok(raw.parse::<YearMonth>()?),
        None => Ok(YearMonth::previous_of(Local::now().date_naive())),
    }
}

/// Live poster, checked before any warehouse work so nothing half-runs.
fn live_poster(ctx: &AppContext, accounts: &JournalAccounts) -> Result<FreeeClient> {
    accounts.cogs.require_id()?;
    accounts.inventory.require_id()?;
    let token = std::env::var("FREEE_ACCESS_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| OpsError::Accounting("FREEE_ACCESS_TOKEN is not set".to_string()))?;
    FreeeClient::new(&ctx.config.accounting, token.trim())
}

/// Run the month's sync and render what goes to stdout: plain text, or a
/// single JSON document when `json` is set.
async fn run_sync(
    warehouse: &dyn Warehouse,
    poster: &dyn JournalPoster,
    tables: &WarehouseTables,
    accounts: &JournalAccounts,
    month: YearMonth,
    json: bool,
) -> Result<String> {
    let mut lines = vec![format!("Processing COGS for {}...", month)];
    let outcome = sync_month(warehouse, poster, tables, accounts, month, |entry| {
        lines.push(format_journal_preview(month, entry));
    })
    .await
    .with_context(|| format!("COGS sync for {} failed", month))?;

    match outcome {
        SyncOutcome::NoCogs => {
            if json {
                return Ok(serde_json::to_string_pretty(
                    &serde_json::json!({"month": month, "status": "no_cogs"}),
                )?);
            }
            lines.push(format_no_cogs(month));
        }
        SyncOutcome::Posted { entry, id } => {
            if let JournalEntryId::Posted(posted) = id {
                info!("Posted manual journal {} for {}", posted, month);
            }
            if json {
                let (status, journal_id) = match id {
                    JournalEntryId::DryRun => ("dry_run", None),
                    JournalEntryId::Posted(posted) => ("posted", Some(posted)),
                };
                let payload = serde_json::json!({
                    "month": month,
                    "status": status,
                    "issue_date": entry.issue_date,
                    "amount": entry.amount,
                    "debit": entry.debit.name,
                    "credit": entry.credit.name,
                    "journal_id": journal_id,
                });
                return Ok(serde_json::to_string_pretty(&payload)?);
            }
            lines.push(format_journal_result(&entry, id));
        }
    }
    Ok(lines.join("\n"))
}

pub async fn dispatch_cogs(ctx: &AppContext, action: CogsCommands) -> Result<()> {
    match action {
        CogsCommands::Sync { month, post } => {
            let month = target_month(month.as_deref())?;
            let accounts = JournalAccounts::from_config(&ctx.config.accounting);
            let poster: Box<dyn JournalPoster> = if post {
                Box::new(live_poster(ctx, &accounts)?)
            } else {
                Box::new(DryRunPoster::new())
            };

            let credentials = ctx.google_credentials().await?.ok_or_else(|| {
                OpsError::Credentials("GOOGLE_APPLICATION_CREDENTIALS is not set".to_string())
            })?;
            let tables = ctx.tables()?;
            let warehouse = BigQueryClient::new(tables.project_id.clone(), credentials)?;

            let report = run_sync(
                &warehouse,
                poster.as_ref(),
                &tables,
                &accounts,
                month,
                ctx.json,
            )
            .await?;
            println!("{}", report);
            Ok(())
        }
    }
}
