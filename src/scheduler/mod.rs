//! Scheduled-query definitions and idempotent registration
//!
//! Jobs are matched to existing scheduled queries by display name. A missing
//! job is created, an identical one is left alone, and a changed one is
//! patched in place, so registering twice never produces a duplicate.

pub mod datatransfer;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::transforms::daily_asin::daily_asin_sql;
use crate::transforms::settlement_pnl::settlement_pnl_sql;
use crate::transforms::sql::WarehouseTables;

pub use datatransfer::DataTransferClient;

pub const SCHEDULED_QUERY_SOURCE: &str = "scheduled_query";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    #[serde(default)]
    pub query: String,
}

/// Data Transfer `TransferConfig` resource, the fields this crate manages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// Resource name, assigned by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub data_source_id: String,
    #[serde(default)]
    pub destination_dataset_id: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub params: TransferParams,
    #[serde(default, skip_serializing)]
    pub state: Option<String>,
    #[serde(default, skip_serializing)]
    pub next_run_time: Option<String>,
}

impl TransferConfig {
    /// Managed fields that differ from `desired`, as update-mask paths
    pub fn changed_fields(&self, desired: &TransferConfig) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.destination_dataset_id != desired.destination_dataset_id {
            fields.push("destinationDatasetId");
        }
        if self.schedule != desired.schedule {
            fields.push("schedule");
        }
        if self.params.query.trim() != desired.params.query.trim() {
            fields.push("params");
        }
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledJob {
    DailyAsin,
    SettlementPnl,
}

impl ScheduledJob {
    pub const ALL: [ScheduledJob; 2] = [ScheduledJob::DailyAsin, ScheduledJob::SettlementPnl];

    pub fn key(self) -> &'static str {
        match self {
            ScheduledJob::DailyAsin => "daily-asin",
            ScheduledJob::SettlementPnl => "settlement-pnl",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ScheduledJob::DailyAsin => "EC Analytics: fact_daily_asin + fact_daily_parent_asin",
            ScheduledJob::SettlementPnl => "EC Analytics: fact_monthly_settlement_sku",
        }
    }

    /// Daily run time, UTC
    pub fn schedule(self) -> &'static str {
        match self {
            ScheduledJob::DailyAsin => "every day 17:00",
            ScheduledJob::SettlementPnl => "every day 18:00",
        }
    }

    pub fn sql(self, tables: &WarehouseTables) -> String {
        match self {
            ScheduledJob::DailyAsin => daily_asin_sql(tables),
            ScheduledJob::SettlementPnl => settlement_pnl_sql(tables),
        }
    }

    pub fn definition(self, tables: &WarehouseTables) -> TransferConfig {
        TransferConfig {
            name: None,
            display_name: self.display_name().to_string(),
            data_source_id: SCHEDULED_QUERY_SOURCE.to_string(),
            destination_dataset_id: tables.analytics.clone(),
            schedule: self.schedule().to_string(),
            params: TransferParams {
                query: self.sql(tables),
            },
            state: None,
            next_run_time: None,
        }
    }
}

/// Scheduled-query service for one project location
#[async_trait]
pub trait ScheduledQueries: Send + Sync {
    async fn list(&self) -> Result<Vec<TransferConfig>>;

    async fn create(&self, config: &TransferConfig) -> Result<TransferConfig>;

    async fn update(
        &self,
        name: &str,
        config: &TransferConfig,
        update_mask: &[&'static str],
    ) -> Result<TransferConfig>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update {
        name: String,
        fields: Vec<&'static str>,
    },
    Unchanged {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationPlan {
    #[serde(flatten)]
    pub action: PlannedAction,
    /// Other existing jobs with the same display name
    pub duplicates: Vec<String>,
}

/// Decide what registering `desired` requires given the existing jobs.
pub fn plan_registration(existing: &[TransferConfig], desired: &TransferConfig) -> RegistrationPlan {
    let mut matching: Vec<&TransferConfig> = existing
        .iter()
        .filter(|c| c.display_name == desired.display_name)
        .collect();
    matching.sort_by(|a, b| a.name.cmp(&b.name));

    let Some((current, rest)) = matching.split_first() else {
        return RegistrationPlan {
            action: PlannedAction::Create,
            duplicates: Vec::new(),
        };
    };

    let name = current.name.clone().unwrap_or_default();
    let fields = current.changed_fields(desired);
    let action = if fields.is_empty() {
        PlannedAction::Unchanged { name }
    } else {
        PlannedAction::Update { name, fields }
    };
    RegistrationPlan {
        action,
        duplicates: rest.iter().filter_map(|c| c.name.clone()).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Created(TransferConfig),
    Updated {
        config: TransferConfig,
        fields: Vec<&'static str>,
    },
    Unchanged(String),
}

impl RegistrationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RegistrationOutcome::Created(_) => "created",
            RegistrationOutcome::Updated { .. } => "updated",
            RegistrationOutcome::Unchanged(_) => "unchanged",
        }
    }
}

/// Create or update the job so exactly one definition with its display name
/// is current.
pub async fn register<S: ScheduledQueries + ?Sized>(
    service: &S,
    desired: &TransferConfig,
) -> Result<RegistrationOutcome> {
    let existing = service
        .list()
        .await
        .context("Failed to list scheduled queries")?;
    let plan = plan_registration(&existing, desired);
    for duplicate in &plan.duplicates {
        warn!(
            "Duplicate scheduled query '{}' ({}) left untouched",
            desired.display_name, duplicate
        );
    }

    match plan.action {
        PlannedAction::Create => {
            let created = service
                .create(desired)
                .await
                .with_context(|| format!("Failed to create '{}'", desired.display_name))?;
            info!("Created {:?}", created.name);
            Ok(RegistrationOutcome::Created(created))
        }
        PlannedAction::Update { name, fields } => {
            let updated = service
                .update(&name, desired, &fields)
                .await
                .with_context(|| format!("Failed to update '{}'", desired.display_name))?;
            info!("Updated {} ({})", name, fields.join(", "));
            Ok(RegistrationOutcome::Updated {
                config: updated,
                fields,
            })
        }
        PlannedAction::Unchanged { name } => {
            info!("{} is up to date", name);
            Ok(RegistrationOutcome::Unchanged(name))
        }
    }
}
