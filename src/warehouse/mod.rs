//! Warehouse access
//!
//! The `Warehouse` trait is the seam between the commands and BigQuery; the
//! REST implementation lives in [`bigquery`].

pub mod auth;
pub mod bigquery;
#[cfg(test)]
pub(crate) mod testing;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub use auth::Credentials;
pub use bigquery::BigQueryClient;

/// One column of a table schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: String,
    /// NULLABLE, REQUIRED or REPEATED
    pub mode: String,
    pub description: Option<String>,
}

/// Table metadata as reported by the warehouse
#[derive(Debug, Clone)]
pub struct TableMetadata {
    pub table_id: String,
    pub num_rows: u64,
    pub num_bytes: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub schema: Vec<FieldSchema>,
}

/// A named STRING query parameter (`@name` in SQL)
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub max_results: Option<u32>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(QueryParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn max_results(mut self, n: u32) -> Self {
        self.max_results = Some(n);
        self
    }
}

/// Query rows keyed by column name. Scalar cells keep the warehouse's JSON
/// encoding (BigQuery returns numbers as strings).
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell of the first row, `None` when there are no rows or the value is NULL.
    pub fn first_value(&self, column: &str) -> Option<&Value> {
        self.rows
            .first()
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null())
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    fn project_id(&self) -> &str;

    async fn list_datasets(&self) -> Result<Vec<String>>;

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>>;

    async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableMetadata>;

    async fn query(&self, request: &QueryRequest) -> Result<QueryResult>;
}
