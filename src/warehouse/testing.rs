//! In-memory warehouse used by unit tests

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{FieldSchema, QueryRequest, QueryResult, TableMetadata, Warehouse};

/// In-memory warehouse: dataset → tables, with optional failing samples
#[derive(Default)]
pub(crate) struct FakeWarehouse {
    pub datasets: Vec<(String, Vec<String>)>,
    pub failing_samples: Vec<String>,
    /// SQL fragment → canned result
    pub query_results: HashMap<String, QueryResult>,
    pub queries: Mutex<Vec<QueryRequest>>,
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    fn project_id(&self) -> &str {
        "test-project"
    }

    async fn list_datasets(&self) -> Result<Vec<String>> {
        Ok(self.datasets.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>> {
        Ok(self
            .datasets
            .iter()
            .find(|(d, _)| d == dataset_id)
            .map(|(_, t)| t.clone())
            .unwrap_or_default())
    }

    async fn get_table(&self, _dataset_id: &str, table_id: &str) -> Result<TableMetadata> {
        Ok(TableMetadata {
            table_id: table_id.to_string(),
            num_rows: 1500,
            num_bytes: 2 * 1024 * 1024,
            created: chrono::DateTime::from_timestamp(1_704_067_200, 0),
            modified: None,
            schema: vec![
                FieldSchema {
                    name: "sku".to_string(),
                    field_type: "STRING".to_string(),
                    mode: "REQUIRED".to_string(),
                    description: Some("Seller SKU".to_string()),
                },
                FieldSchema {
                    name: "qty".to_string(),
                    field_type: "INTEGER".to_string(),
                    mode: "NULLABLE".to_string(),
                    description: None,
                },
            ],
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.queries.lock().unwrap().push(request.clone());
        if self.failing_samples.iter().any(|t| request.sql.contains(t.as_str())) {
            anyhow::bail!("Access Denied: {}", request.sql);
        }
        if let Some(result) = self
            .query_results
            .iter()
            .find(|(needle, _)| request.sql.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
        {
            return Ok(result);
        }
        let rows = (0..5)
            .map(|i| {
                let mut row = Map::new();
                row.insert("sku".to_string(), json!(format!("ITEM-{}", i)));
                row
            })
            .collect();
        Ok(QueryResult {
            columns: vec!["sku".to_string()],
            rows,
        })
    }
}
