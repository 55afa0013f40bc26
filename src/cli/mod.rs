use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use ecops::scheduler::ScheduledJob;

pub mod formatters;

#[derive(Parser)]
#[command(name = "ecops")]
#[command(
    version,
    about = "Operational tooling for an e-commerce analytics warehouse"
)]
#[command(
    long_about = "Export the design workbook, inventory the BigQuery warehouse, sync monthly COGS to the accounting ledger and register the scheduled transformation queries."
)]
pub struct Cli {
    /// Config file (default: <config dir>/ecops/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Warehouse project id (overrides config and ECOPS_PROJECT_ID)
    #[arg(long, global = true, value_name = "ID")]
    pub project: Option<String>,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Design workbook with sample data
    Workbook {
        #[command(subcommand)]
        action: WorkbookCommands,
    },

    /// Warehouse structure inventory
    Inventory {
        #[command(subcommand)]
        action: InventoryCommands,
    },

    /// Cost of goods sold accounting
    Cogs {
        #[command(subcommand)]
        action: CogsCommands,
    },

    /// Scheduled transformation queries
    Scheduled {
        #[command(subcommand)]
        action: ScheduledCommands,
    },
}

#[derive(Subcommand)]
pub enum WorkbookCommands {
    /// Write the sample design workbook
    Export {
        /// Output path (default: paths.workbook from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum InventoryCommands {
    /// Scan datasets, tables, schemas and sample rows into a JSON artifact
    Scan {
        /// Output path (default: paths.inventory from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a previously written inventory artifact
    Summary {
        /// Inventory file (default: paths.inventory from config)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CogsCommands {
    /// Post the month's COGS journal entry (dry run unless --post)
    Sync {
        /// Month in YYYY-MM format (default: previous month)
        month: Option<String>,

        /// Post to the accounting API instead of a dry run
        #[arg(long)]
        post: bool,
    },
}

#[derive(Subcommand)]
pub enum ScheduledCommands {
    /// Print a job definition and its SQL
    Show {
        #[arg(value_enum)]
        job: JobArg,
    },

    /// Create or update scheduled queries
    Register {
        #[arg(value_enum)]
        job: JobSelection,

        /// Show what would be sent without changing anything
        #[arg(short, long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JobArg {
    DailyAsin,
    SettlementPnl,
}

impl From<JobArg> for ScheduledJob {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::DailyAsin => ScheduledJob::DailyAsin,
            JobArg::SettlementPnl => ScheduledJob::SettlementPnl,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JobSelection {
    DailyAsin,
    SettlementPnl,
    All,
}

impl JobSelection {
    pub fn jobs(self) -> Vec<ScheduledJob> {
        match self {
            JobSelection::DailyAsin => vec![ScheduledJob::DailyAsin],
            JobSelection::SettlementPnl => vec![ScheduledJob::SettlementPnl],
            JobSelection::All => ScheduledJob::ALL.to_vec(),
        }
    }
}
