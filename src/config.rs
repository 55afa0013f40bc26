//! Configuration for ecops
//!
//! Project identifiers, dataset names, output paths and accounting settings
//! live in a TOML file (`<config_home>/ecops/config.toml` by default) with
//! environment-variable overrides applied on top.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::OpsError;

/// Placeholder company id used when none is configured
pub const PLACEHOLDER_COMPANY_ID: &str = "YOUR_COMPANY_ID";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Warehouse project id
    pub project_id: Option<String>,
    /// Data Transfer location scheduled queries are registered in
    pub location: String,
    /// Credential file path (from `GOOGLE_APPLICATION_CREDENTIALS`)
    pub credentials_path: Option<PathBuf>,
    pub paths: PathsConfig,
    pub datasets: DatasetsConfig,
    pub accounting: AccountingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Spreadsheet written by `workbook export`
    pub workbook: PathBuf,
    /// JSON artifact written by `inventory scan`, read by `inventory summary`
    pub inventory: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetsConfig {
    pub analytics: String,
    pub product_master: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountingConfig {
    pub company_id: String,
    pub cogs_account_id: Option<u64>,
    pub inventory_account_id: Option<u64>,
    pub tax_code: u32,
    pub api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            location: "us-central1".to_string(),
            credentials_path: None,
            paths: PathsConfig::default(),
            datasets: DatasetsConfig::default(),
            accounting: AccountingConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("database_design.xlsx"),
            inventory: PathBuf::from("bigquery_structure.json"),
        }
    }
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            analytics: "analytics".to_string(),
            product_master: "nocodb".to_string(),
        }
    }
}

impl Default for AccountingConfig {
    fn default() -> Self {
        Self {
            company_id: PLACEHOLDER_COMPANY_ID.to_string(),
            cogs_account_id: None,
            inventory_account_id: None,
            tax_code: 108,
            api_base: "https://api.freee.co.jp".to_string(),
        }
    }
}

/// Default config file location: `<config_home>/ecops/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("ecops").join("config.toml"))
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present, otherwise built-in defaults. Environment overrides
    /// are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => Self::from_file(&p)?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_path = Some(PathBuf::from(path));
        }
        if let Some(project) = non_empty("ECOPS_PROJECT_ID") {
            self.project_id = Some(project);
        }
        if let Some(company) = non_empty("FREEE_COMPANY_ID") {
            self.accounting.company_id = company;
        }
    }

    /// Project id, required by every command that talks to the warehouse
    pub fn require_project(&self) -> Result<&str, OpsError> {
        self.project_id.as_deref().ok_or_else(|| {
            OpsError::Config(
                "project_id is not set (use --project, ECOPS_PROJECT_ID or the config file)"
                    .to_string(),
            )
        })
    }
}
