use anyhow::Result;
use colored::Colorize;
use tracing::info;

use super::AppContext;
use crate::cli::WorkbookCommands;
use ecops::workbook::export_design_workbook;

pub async fn dispatch_workbook(ctx: &AppContext, action: WorkbookCommands) -> Result<()> {
    match action {
        WorkbookCommands::Export { output } => {
            let path = output.unwrap_or_else(|| ctx.config.paths.workbook.clone());
            info!("Exporting design workbook to {}", path.display());

            let sheets = export_design_workbook(&path)?;

            if ctx.json {
                let payload = serde_json::json!({
                    "path": path,
                    "sheets": sheets,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} Created design document at {}",
                    "✓".green().bold(),
                    path.display()
                );
            }
            Ok(())
        }
    }
}
