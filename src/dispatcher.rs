//! Command dispatcher that routes parsed clap commands to their handlers.
//!
//! Handlers share an [`AppContext`] holding the loaded configuration and the
//! global output flags.

mod cogs;
mod inventory;
mod scheduled;
mod workbook;

use anyhow::Result;
use tracing::debug;

use crate::cli::{Cli, Commands};
use ecops::config::Config;
use ecops::transforms::sql::WarehouseTables;
use ecops::warehouse::Credentials;

pub struct AppContext {
    pub config: Config,
    pub json: bool,
}

impl AppContext {
    pub fn project_id(&self) -> Result<&str> {
        Ok(self.config.require_project()?)
    }

    pub fn tables(&self) -> Result<WarehouseTables> {
        Ok(WarehouseTables::from_config(&self.config, self.project_id()?))
    }

    /// Access token for the Google APIs; `None` when no credential file is
    /// configured.
    pub async fn google_credentials(&self) -> Result<Option<Credentials>> {
        match &self.config.credentials_path {
            Some(path) => Ok(Some(Credentials::acquire(path).await?)),
            None => Ok(None),
        }
    }
}

/// Route a parsed command to its handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(project) = cli.project.filter(|p| !p.trim().is_empty()) {
        config.project_id = Some(project);
    }
    debug!("Using project {:?}", config.project_id);

    let ctx = AppContext {
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Workbook { action } => workbook::dispatch_workbook(&ctx, action).await,
        Commands::Inventory { action } => inventory::dispatch_inventory(&ctx, action).await,
        Commands::Cogs { action } => cogs::dispatch_cogs(&ctx, action).await,
        Commands::Scheduled { action } => scheduled::dispatch_scheduled(&ctx, action).await,
    }
}
