use anyhow::Result;
use colored::Colorize;
use tracing::info;

use super::AppContext;
use crate::cli::formatters::{format_missing_credentials, format_no_datasets, format_scan_event};
use crate::cli::InventoryCommands;
use ecops::inventory::summary::{render_summary, summarize};
use ecops::inventory::{read_inventory, scan_inventory, to_json, write_inventory, ScanOutcome};
use ecops::warehouse::BigQueryClient;

pub async fn dispatch_inventory(ctx: &AppContext, action: InventoryCommands) -> Result<()> {
    match action {
        InventoryCommands::Scan { output } => {
            let Some(credentials) = ctx.google_credentials().await? else {
                print!("{}", format_missing_credentials("nothing to scan"));
                return Ok(());
            };
            let project_id = ctx.project_id()?;
            let client = BigQueryClient::new(project_id, credentials)?;
            info!("Scanning warehouse project {}", project_id);

            // progress goes to the terminal only outside JSON mode
            let json = ctx.json;
            let outcome = scan_inventory(&client, |ev| {
                if !json {
                    print!("{}", format_scan_event(&ev));
                }
            })
            .await?;

            let inventory = match outcome {
                ScanOutcome::NoDatasets => {
                    print!("{}", format_no_datasets(project_id));
                    return Ok(());
                }
                ScanOutcome::Complete(inventory) => inventory,
            };

            let path = output.unwrap_or_else(|| ctx.config.paths.inventory.clone());
            write_inventory(&inventory, &path)?;

            if !json {
                println!("\n{}", "=".repeat(80));
                println!("{}", "Structure (JSON)".bold());
                println!("{}", "=".repeat(80));
            }
            println!("{}", to_json(&inventory)?);
            if !json {
                println!(
                    "\n{} Saved structure to {}",
                    "✓".green().bold(),
                    path.display()
                );
            }
            Ok(())
        }
        InventoryCommands::Summary { input } => {
            let path = input.unwrap_or_else(|| ctx.config.paths.inventory.clone());
            let inventory = read_inventory(&path)?;
            let summary = summarize(&inventory);

            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render_summary(&summary));
            }
            Ok(())
        }
    }
}
