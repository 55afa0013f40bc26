//! Warehouse inventory: datasets, tables, columns and sample rows
//!
//! `scan_inventory` walks every dataset of a project and produces the JSON
//! artifact that `inventory summary` reads back.

pub mod summary;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::utils::bytes_to_mb;
use crate::warehouse::{QueryRequest, TableMetadata, Warehouse};

/// Rows sampled per table
pub const SAMPLE_ROWS: u32 = 3;

/// dataset id → dataset inventory
pub type Inventory = BTreeMap<String, DatasetInventory>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInventory {
    pub dataset_id: String,
    pub tables: Vec<TableInventory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInventory {
    pub table_id: String,
    pub num_rows: u64,
    pub size_mb: f64,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_rows: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub mode: String,
    pub description: Option<String>,
}

impl ColumnInfo {
    /// `name: TYPE (MODE) - description`, mode omitted when NULLABLE
    pub fn describe(&self) -> String {
        let mut out = format!("{}: {}", self.name, self.column_type);
        if self.mode != "NULLABLE" {
            out.push_str(&format!(" ({})", self.mode));
        }
        if let Some(desc) = self.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(" - {}", desc));
        }
        out
    }
}

impl TableInventory {
    fn from_metadata(meta: TableMetadata) -> Self {
        Self {
            table_id: meta.table_id,
            num_rows: meta.num_rows,
            size_mb: bytes_to_mb(meta.num_bytes),
            created: meta.created.map(|t| t.to_rfc3339()),
            modified: meta.modified.map(|t| t.to_rfc3339()),
            columns: meta
                .schema
                .into_iter()
                .map(|f| ColumnInfo {
                    name: f.name,
                    column_type: f.field_type,
                    mode: f.mode,
                    description: f.description,
                })
                .collect(),
            sample_rows: Vec::new(),
            sample_error: None,
        }
    }
}

/// Progress of a scan, reported as it happens
#[derive(Debug)]
pub enum ScanEvent<'a> {
    DatasetCount(usize),
    Dataset { dataset_id: &'a str, table_count: usize },
    Table { dataset_id: &'a str, table: &'a TableInventory },
}

#[derive(Debug)]
pub enum ScanOutcome {
    /// The project has no datasets at all
    NoDatasets,
    Complete(Inventory),
}

fn sample_sql(project_id: &str, dataset_id: &str, table_id: &str) -> String {
    format!(
        "SELECT * FROM `{}.{}.{}` LIMIT {}",
        project_id, dataset_id, table_id, SAMPLE_ROWS
    )
}

/// Walk every dataset and table of the warehouse project.
///
/// A failing sample query is recorded on its table and the scan continues;
/// listing and metadata failures abort the scan.
pub async fn scan_inventory<W, F>(warehouse: &W, mut on_event: F) -> Result<ScanOutcome>
where
    W: Warehouse + ?Sized,
    F: FnMut(ScanEvent<'_>),
{
    let project_id = warehouse.project_id().to_string();
    let datasets = warehouse
        .list_datasets()
        .await
        .with_context(|| format!("Failed to list datasets of {}", project_id))?;

    if datasets.is_empty() {
        return Ok(ScanOutcome::NoDatasets);
    }
    on_event(ScanEvent::DatasetCount(datasets.len()));

    let mut inventory = Inventory::new();
    for dataset_id in &datasets {
        let table_ids = warehouse
            .list_tables(dataset_id)
            .await
            .with_context(|| format!("Failed to list tables of {}", dataset_id))?;
        on_event(ScanEvent::Dataset {
            dataset_id,
            table_count: table_ids.len(),
        });
        if table_ids.is_empty() {
            continue;
        }

        let mut tables = Vec::with_capacity(table_ids.len());
        for table_id in &table_ids {
            let meta = warehouse
                .get_table(dataset_id, table_id)
                .await
                .with_context(|| format!("Failed to read metadata of {}.{}", dataset_id, table_id))?;
            let mut table = TableInventory::from_metadata(meta);

            let request = QueryRequest::new(sample_sql(&project_id, dataset_id, table_id))
                .max_results(SAMPLE_ROWS);
            match warehouse.query(&request).await {
                Ok(result) => {
                    table.sample_rows = result
                        .rows
                        .into_iter()
                        .take(SAMPLE_ROWS as usize)
                        .map(Value::Object)
                        .collect();
                }
                Err(e) => {
                    warn!("Sample query failed for {}.{}: {:#}", dataset_id, table_id, e);
                    table.sample_error = Some(format!("{:#}", e));
                }
            }

            on_event(ScanEvent::Table {
                dataset_id,
                table: &table,
            });
            tables.push(table);
        }

        inventory.insert(
            dataset_id.clone(),
            DatasetInventory {
                dataset_id: dataset_id.clone(),
                tables,
            },
        );
    }

    info!("Scanned {} datasets", inventory.len());
    Ok(ScanOutcome::Complete(inventory))
}

/// Pretty JSON, non-ASCII kept as-is
pub fn to_json(inventory: &Inventory) -> Result<String> {
    Ok(serde_json::to_string_pretty(inventory)?)
}

pub fn write_inventory(inventory: &Inventory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, to_json(inventory)?)
        .with_context(|| format!("Failed to write inventory to {}", path.display()))
}

pub fn read_inventory(path: &Path) -> Result<Inventory> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse inventory file {}", path.display()))
}
