use anyhow::Result;
use tracing::info;

use super::AppContext;
use crate::cli::formatters::{
    format_job_definition, format_missing_credentials, format_plan, format_registration_table,
};
use crate::cli::ScheduledCommands;
use ecops::scheduler::{
    plan_registration, register, DataTransferClient, RegistrationPlan, ScheduledJob, ScheduledQueries,
    TransferConfig,
};
use ecops::transforms::sql::WarehouseTables;

fn parent(ctx: &AppContext, project_id: &str) -> String {
    format!("projects/{}/locations/{}", project_id, ctx.config.location)
}

/// Planned action per job; one JSON array in JSON mode.
fn render_dry_run(
    existing: &[TransferConfig],
    jobs: &[ScheduledJob],
    tables: &WarehouseTables,
    json: bool,
) -> Result<String> {
    let plans: Vec<(ScheduledJob, TransferConfig, RegistrationPlan)> = jobs
        .iter()
        .map(|job| {
            let definition = job.definition(tables);
            let plan = plan_registration(existing, &definition);
            (*job, definition, plan)
        })
        .collect();

    if json {
        let payload: Vec<_> = plans
            .iter()
            .map(|(job, definition, plan)| {
                serde_json::json!({
                    "job": job.key(),
                    "plan": plan,
                    "definition": definition,
                })
            })
            .collect();
        return Ok(format!("{}\n", serde_json::to_string_pretty(&payload)?));
    }
    Ok(plans
        .iter()
        .map(|(job, _, plan)| format_plan(*job, plan))
        .collect())
}

pub async fn dispatch_scheduled(ctx: &AppContext, action: ScheduledCommands) -> Result<()> {
    match action {
        ScheduledCommands::Show { job } => {
            let job: ScheduledJob = job.into();
            let tables = ctx.tables()?;
            let definition = job.definition(&tables);
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&definition)?);
            } else {
                print!(
                    "{}",
                    format_job_definition(job, &definition, &parent(ctx, &tables.project_id))
                );
            }
            Ok(())
        }
        ScheduledCommands::Register { job, dry_run } => {
            let Some(credentials) = ctx.google_credentials().await? else {
                print!("{}", format_missing_credentials("nothing to register"));
                return Ok(());
            };
            let tables = ctx.tables()?;
            let client = DataTransferClient::new(&tables.project_id, &ctx.config.location, credentials)?;
            info!("Registering scheduled queries in {}", client.parent());

            if dry_run {
                let existing = client.list().await?;
                print!("{}", render_dry_run(&existing, &job.jobs(), &tables, ctx.json)?);
                return Ok(());
            }

            let mut results = Vec::new();
            for job in job.jobs() {
                let outcome = register(&client, &job.definition(&tables)).await?;
                results.push((job, outcome));
            }

            if ctx.json {
                let payload: Vec<_> = results
                    .iter()
                    .map(|(job, outcome)| {
                        serde_json::json!({
                            "job": job.key(),
                            "result": outcome.label(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", format_registration_table(&results));
            }
            Ok(())
        }
    }
}
