//! freee accounting API: manual journals

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{JournalEntry, JournalEntryId, JournalPoster};
use crate::config::{AccountingConfig, PLACEHOLDER_COMPANY_ID};
use crate::error::OpsError;

#[derive(Debug, Serialize, PartialEq)]
pub struct ManualJournalRequest {
    pub company_id: u64,
    pub issue_date: String,
    pub details: Vec<ManualJournalDetail>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ManualJournalDetail {
    pub account_item_id: u64,
    pub tax_code: u32,
    pub amount: i64,
    pub entry_side: &'static str,
}

#[derive(Debug, Deserialize)]
struct ManualJournalResponse {
    manual_journal: ManualJournal,
}

#[derive(Debug, Deserialize)]
struct ManualJournal {
    id: u64,
}

pub struct FreeeClient {
    http: Client,
    api_base: String,
    company_id: u64,
    tax_code: u32,
    access_token: String,
}

impl FreeeClient {
    /// Client for live posting. The placeholder company id is refused.
    pub fn new(config: &AccountingConfig, access_token: impl Into<String>) -> Result<Self> {
        let company_id = parse_company_id(&config.company_id)?;
        let http = Client::builder()
            .user_agent(concat!("ecops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            company_id,
            tax_code: config.tax_code,
            access_token: access_token.into(),
        })
    }

    pub fn request_body(&self, entry: &JournalEntry) -> Result<ManualJournalRequest> {
        manual_journal_request(self.company_id, self.tax_code, entry)
    }
}

fn parse_company_id(raw: &str) -> Result<u64, OpsError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == PLACEHOLDER_COMPANY_ID {
        return Err(OpsError::Accounting(
            "company id is not configured (set FREEE_COMPANY_ID or accounting.company_id)"
                .to_string(),
        ));
    }
    raw.parse()
        .map_err(|_| OpsError::Accounting(format!("invalid company id '{}'", raw)))
}

/// Balanced two-line manual journal for `entry`
pub fn manual_journal_request(
    company_id: u64,
    tax_code: u32,
    entry: &JournalEntry,
) -> Result<ManualJournalRequest> {
    let debit_id = entry.debit.require_id()?;
    let credit_id = entry.credit.require_id()?;
    Ok(ManualJournalRequest {
        company_id,
        issue_date: entry.issue_date.format("%Y-%m-%d").to_string(),
        details: vec![
            ManualJournalDetail {
                account_item_id: debit_id,
                tax_code,
                amount: entry.amount,
                entry_side: "debit",
            },
            ManualJournalDetail {
                account_item_id: credit_id,
                tax_code,
                amount: entry.amount,
                entry_side: "credit",
            },
        ],
    })
}

#[async_trait]
impl JournalPoster for FreeeClient {
    async fn post_journal_entry(&self, entry: &JournalEntry) -> Result<JournalEntryId> {
        let body = self.request_body(entry)?;
        let url = format!("{}/api/1/manual_journals", self.api_base);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send manual journal request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OpsError::Accounting(format!("HTTP {}: {}", status.as_u16(), text.trim())).into());
        }

        let created: ManualJournalResponse = response
            .json()
            .await
            .context("Failed to parse manual journal response")?;
        info!("Created manual journal {}", created.manual_journal.id);
        Ok(JournalEntryId::Posted(created.manual_journal.id))
    }
}
