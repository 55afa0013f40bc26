//! Monthly COGS sync from the warehouse into the accounting ledger

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info};

use super::{JournalAccounts, JournalEntry, JournalEntryId, JournalPoster};
use crate::period::YearMonth;
use crate::transforms::sql::WarehouseTables;
use crate::utils::format_yen;
use crate::warehouse::{QueryRequest, Warehouse};

/// Report table the monthly COGS is read from
pub const COGS_REPORT_TABLE: &str = "rpt_freee_journal";

pub fn monthly_cogs_sql(tables: &WarehouseTables) -> String {
    format!(
        "SELECT month, SUM(total_cogs_jpy) AS monthly_cogs\nFROM {}\nWHERE month = @month\nGROUP BY month",
        tables.analytics(COGS_REPORT_TABLE)
    )
}

fn parse_amount(value: &Value) -> Result<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .with_context(|| format!("Invalid COGS amount '{}'", s)),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .with_context(|| format!("Invalid COGS amount '{}'", n)),
        other => anyhow::bail!("Unexpected COGS value {}", other),
    }
}

/// Total COGS for `month`, `None` when the report has no row or a NULL sum.
pub async fn fetch_monthly_cogs<W: Warehouse + ?Sized>(
    warehouse: &W,
    tables: &WarehouseTables,
    month: YearMonth,
) -> Result<Option<Decimal>> {
    let request = QueryRequest::new(monthly_cogs_sql(tables)).param("month", month.to_string());
    let result = warehouse
        .query(&request)
        .await
        .with_context(|| format!("Failed to query COGS for {}", month))?;
    result
        .first_value("monthly_cogs")
        .map(parse_amount)
        .transpose()
}

/// Journal entry for a positive COGS total: dated the last day of the month,
/// amount truncated to whole yen.
pub fn cogs_journal_entry(
    month: YearMonth,
    cogs: Decimal,
    accounts: &JournalAccounts,
) -> Option<JournalEntry> {
    let amount = cogs.trunc().to_i64().filter(|a| *a > 0)?;
    Some(JournalEntry {
        issue_date: month.last_day(),
        debit: accounts.cogs.clone(),
        credit: accounts.inventory.clone(),
        amount,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No rows, NULL, zero or negative total
    NoCogs,
    Posted {
        entry: JournalEntry,
        id: JournalEntryId,
    },
}

/// Read the month's COGS and post it. `on_prepared` sees the entry before it
/// goes to the poster.
pub async fn sync_month<W, P, F>(
    warehouse: &W,
    poster: &P,
    tables: &WarehouseTables,
    accounts: &JournalAccounts,
    month: YearMonth,
    mut on_prepared: F,
) -> Result<SyncOutcome>
where
    W: Warehouse + ?Sized,
    P: JournalPoster + ?Sized,
    F: FnMut(&JournalEntry),
{
    info!("Processing COGS for {}", month);
    let cogs = fetch_monthly_cogs(warehouse, tables, month).await?;
    match cogs {
        Some(total) => debug!("Monthly COGS for {}: {}", month, format_yen(total)),
        None => debug!("Monthly COGS for {}: none", month),
    }

    let Some(entry) = cogs.and_then(|c| cogs_journal_entry(month, c, accounts)) else {
        return Ok(SyncOutcome::NoCogs);
    };

    on_prepared(&entry);
    let id = poster
        .post_journal_entry(&entry)
        .await
        .with_context(|| format!("Failed to post COGS journal for {}", month))?;
    Ok(SyncOutcome::Posted { entry, id })
}
