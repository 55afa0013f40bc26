//! Accounting journal entries and the posting seam
//!
//! A monthly COGS entry moves cost out of inventory: Dr cost of goods sold,
//! Cr inventory. Posting goes through [`JournalPoster`]; [`DryRunPoster`]
//! only records the entry, [`freee::FreeeClient`] creates a manual journal.
//! Posters never write to stdout; the caller renders the result.

pub mod cogs_sync;
pub mod freee;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::sync::Mutex;

use crate::config::AccountingConfig;
use crate::error::OpsError;
use crate::utils::format_count;

pub const COGS_ACCOUNT_NAME: &str = "売上原価";
pub const INVENTORY_ACCOUNT_NAME: &str = "棚卸資産";

/// Ledger account; the id is the accounting system's account item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub name: String,
    pub id: Option<u64>,
}

impl AccountRef {
    pub fn new(name: impl Into<String>, id: Option<u64>) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    pub fn require_id(&self) -> Result<u64, OpsError> {
        self.id.ok_or_else(|| {
            OpsError::Accounting(format!("no account item id configured for {}", self.name))
        })
    }
}

/// Debit/credit pair for the COGS entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalAccounts {
    pub cogs: AccountRef,
    pub inventory: AccountRef,
}

impl JournalAccounts {
    pub fn from_config(config: &AccountingConfig) -> Self {
        Self {
            cogs: AccountRef::new(COGS_ACCOUNT_NAME, config.cogs_account_id),
            inventory: AccountRef::new(INVENTORY_ACCOUNT_NAME, config.inventory_account_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub issue_date: NaiveDate,
    pub debit: AccountRef,
    pub credit: AccountRef,
    /// Whole yen
    pub amount: i64,
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Amount: {} JPY", format_count(self.amount))?;
        write!(f, "Dr: {} / Cr: {}", self.debit.name, self.credit.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEntryId {
    DryRun,
    Posted(u64),
}

#[async_trait]
pub trait JournalPoster: Send + Sync {
    async fn post_journal_entry(&self, entry: &JournalEntry) -> Result<JournalEntryId>;
}

/// Records the entry and skips the API call
#[derive(Debug, Default)]
pub struct DryRunPoster {
    entries: Mutex<Vec<JournalEntry>>,
}

impl DryRunPoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries seen so far
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl JournalPoster for DryRunPoster {
    async fn post_journal_entry(&self, entry: &JournalEntry) -> Result<JournalEntryId> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        Ok(JournalEntryId::DryRun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> JournalEntry {
        let accounts = JournalAccounts::from_config(&AccountingConfig::default());
        JournalEntry {
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            debit: accounts.cogs,
            credit: accounts.inventory,
            amount: 120_000,
        }
    }

    #[test]
    fn test_entry_description() {
        assert_eq!(
            entry().to_string(),
            "Amount: 120,000 JPY\nDr: 売上原価 / Cr: 棚卸資産"
        );
    }

    #[test]
    fn test_missing_account_id_is_an_error() {
        let e = entry();
        let err = e.debit.require_id().unwrap_err();
        assert!(err.to_string().contains("売上原価"));
        assert_eq!(AccountRef::new("x", Some(7)).require_id().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dry_run_poster_records_without_posting() {
        let poster = DryRunPoster::new();
        let id = poster.post_journal_entry(&entry()).await.unwrap();
        assert_eq!(id, JournalEntryId::DryRun);
        assert_eq!(poster.entries(), vec![entry()]);
    }
}
