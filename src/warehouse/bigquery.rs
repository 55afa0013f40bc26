use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Credentials, FieldSchema, QueryRequest, QueryResult, TableMetadata, Warehouse};
use crate::error::{google_error_message, OpsError};

const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Server-side wait per query/poll request
const QUERY_TIMEOUT_MS: u32 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetListEntry {
    dataset_reference: DatasetReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetReference {
    dataset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables: Vec<TableListEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListEntry {
    table_reference: TableReference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    table_reference: TableReference,
    num_rows: Option<String>,
    num_bytes: Option<String>,
    creation_time: Option<String>,
    last_modified_time: Option<String>,
    schema: Option<Schema>,
}

#[derive(Debug, Default, Deserialize)]
struct Schema {
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Field {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    mode: Option<String>,
    description: Option<String>,
    #[serde(default)]
    fields: Vec<Field>,
}

impl Field {
    fn is_repeated(&self) -> bool {
        self.mode.as_deref() == Some("REPEATED")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    schema: Option<Schema>,
    #[serde(default)]
    rows: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

/// BigQuery v2 REST client
pub struct BigQueryClient {
    http: Client,
    base_url: String,
    project_id: String,
    credentials: Credentials,
}

impl BigQueryClient {
    pub fn new(project_id: impl Into<String>, credentials: Credentials) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ecops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: BIGQUERY_API.to_string(),
            project_id: project_id.into(),
            credentials,
        })
    }

    fn project_url(&self) -> String {
        format!("{}/projects/{}", self.base_url, self.project_id)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = Url::parse_with_params(url, query)
            .with_context(|| format!("Invalid request URL {}", url))?;
        debug!("GET {}", url);
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(self.credentials.access_token())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        parse_response(response).await
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OpsError::Warehouse {
            status: status.as_u16(),
            message: google_error_message(&body),
        }
        .into());
    }
    response
        .json()
        .await
        .context("Failed to parse BigQuery response")
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// BigQuery timestamps in table resources are epoch milliseconds as strings.
fn parse_epoch_millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

fn to_field_schema(field: &Field) -> FieldSchema {
    FieldSchema {
        name: field.name.clone(),
        field_type: field.field_type.clone(),
        mode: field.mode.clone().unwrap_or_else(|| "NULLABLE".to_string()),
        description: field.description.clone().filter(|d| !d.is_empty()),
    }
}

/// Decode one `{"v": ...}` cell according to its schema field.
fn decode_cell(field: &Field, cell: &Value) -> Value {
    let v = cell.get("v").unwrap_or(&Value::Null);
    if field.is_repeated() {
        return match v.as_array() {
            Some(items) => Value::Array(
                items
                    .iter()
                    .map(|item| decode_scalar_or_record(field, item.get("v").unwrap_or(&Value::Null)))
                    .collect(),
            ),
            None => Value::Null,
        };
    }
    decode_scalar_or_record(field, v)
}

fn decode_scalar_or_record(field: &Field, v: &Value) -> Value {
    if field.fields.is_empty() {
        return v.clone();
    }
    match v.get("f").and_then(Value::as_array) {
        Some(cells) => Value::Object(decode_row(&field.fields, cells)),
        None => Value::Null,
    }
}

fn decode_row(fields: &[Field], cells: &[Value]) -> Map<String, Value> {
    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| (field.name.clone(), decode_cell(field, cell)))
        .collect()
}

fn decode_rows(schema: &Schema, rows: &[Value]) -> QueryResult {
    let rows = rows
        .iter()
        .filter_map(|row| row.get("f").and_then(Value::as_array))
        .map(|cells| decode_row(&schema.fields, cells))
        .collect();
    QueryResult {
        columns: schema.fields.iter().map(|f| f.name.clone()).collect(),
        rows,
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_datasets(&self) -> Result<Vec<String>> {
        let url = format!("{}/datasets", self.project_url());
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![("all", "true".to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let page: DatasetList = self.get_json(&url, &query).await?;
            ids.extend(page.datasets.into_iter().map(|d| d.dataset_reference.dataset_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn list_tables(&self, dataset_id: &str) -> Result<Vec<String>> {
        let url = format!("{}/datasets/{}/tables", self.project_url(), dataset_id);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let query: Vec<(&str, String)> = page_token
                .take()
                .map(|t| vec![("pageToken", t)])
                .unwrap_or_default();
            let page: TableList = self.get_json(&url, &query).await?;
            ids.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(ids)
    }

    async fn get_table(&self, dataset_id: &str, table_id: &str) -> Result<TableMetadata> {
        let url = format!(
            "{}/datasets/{}/tables/{}",
            self.project_url(),
            dataset_id,
            table_id
        );
        let table: TableResource = self.get_json(&url, &[]).await?;
        Ok(TableMetadata {
            table_id: table.table_reference.table_id,
            num_rows: parse_count(table.num_rows.as_deref()),
            num_bytes: parse_count(table.num_bytes.as_deref()),
            created: parse_epoch_millis(table.creation_time.as_deref()),
            modified: parse_epoch_millis(table.last_modified_time.as_deref()),
            schema: table
                .schema
                .unwrap_or_default()
                .fields
                .iter()
                .map(to_field_schema)
                .collect(),
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let url = format!("{}/queries", self.project_url());
        let query_parameters: Vec<Value> = request
            .params
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "parameterType": { "type": "STRING" },
                    "parameterValue": { "value": p.value },
                })
            })
            .collect();
        let body = QueryBody {
            query: &request.sql,
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
            max_results: request.max_results,
            parameter_mode: (!query_parameters.is_empty()).then_some("NAMED"),
            query_parameters,
        };

        debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.credentials.access_token())
            .json(&body)
            .send()
            .await
            .context("Failed to send query to BigQuery")?;
        let mut result: QueryResponse = parse_response(response).await?;

        while !result.job_complete {
            let job = result
                .job_reference
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Incomplete query returned no job reference"))?;
            info!("Waiting for query job {}", job.job_id);
            let poll_url = format!("{}/queries/{}", self.project_url(), job.job_id);
            let mut query = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
            if let Some(location) = &job.location {
                query.push(("location", location.clone()));
            }
            if let Some(max) = request.max_results {
                query.push(("maxResults", max.to_string()));
            }
            result = self.get_json(&poll_url, &query).await?;
        }

        Ok(decode_rows(&result.schema.unwrap_or_default(), &result.rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_resource_parsing() {
        let body = json!({
            "tableReference": {"projectId": "p", "datasetId": "analytics", "tableId": "fact_daily_asin"},
            "numRows": "12345",
            "numBytes": "2097152",
            "creationTime": "1704067200000",
            "lastModifiedTime": "1706745600000",
            "schema": {"fields": [
                {"name": "report_date", "type": "DATE", "mode": "REQUIRED", "description": "Business date"},
                {"name": "child_asin", "type": "STRING"}
            ]}
        });
        let table: TableResource = serde_json::from_value(body).unwrap();
        assert_eq!(parse_count(table.num_rows.as_deref()), 12345);
        assert_eq!(parse_count(table.num_bytes.as_deref()), 2_097_152);
        let created = parse_epoch_millis(table.creation_time.as_deref()).unwrap();
        assert_eq!(created.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        let fields: Vec<FieldSchema> = table.schema.unwrap().fields.iter().map(to_field_schema).collect();
        assert_eq!(fields[0].mode, "REQUIRED");
        assert_eq!(fields[0].description.as_deref(), Some("Business date"));
        assert_eq!(fields[1].mode, "NULLABLE");
        assert!(fields[1].description.is_none());
    }

    #[test]
    fn test_decode_rows_maps_cells_to_columns() {
        let schema: Schema = serde_json::from_value(json!({"fields": [
            {"name": "month", "type": "STRING"},
            {"name": "monthly_cogs", "type": "NUMERIC"}
        ]}))
        .unwrap();
        let rows = vec![json!({"f": [{"v": "2024-03"}, {"v": "120000"}]})];

        let result = decode_rows(&schema, &rows);
        assert_eq!(result.columns, vec!["month", "monthly_cogs"]);
        assert_eq!(result.rows[0]["month"], json!("2024-03"));
        assert_eq!(result.first_value("monthly_cogs"), Some(&json!("120000")));
    }

    #[test]
    fn test_decode_nested_and_repeated_fields() {
        let schema: Schema = serde_json::from_value(json!({"fields": [
            {"name": "tags", "type": "STRING", "mode": "REPEATED"},
            {"name": "dims", "type": "RECORD", "fields": [
                {"name": "w", "type": "INTEGER"},
                {"name": "h", "type": "INTEGER"}
            ]}
        ]}))
        .unwrap();
        let rows = vec![json!({"f": [
            {"v": [{"v": "a"}, {"v": "b"}]},
            {"v": {"f": [{"v": "10"}, {"v": null}]}}
        ]})];

        let result = decode_rows(&schema, &rows);
        assert_eq!(result.rows[0]["tags"], json!(["a", "b"]));
        assert_eq!(result.rows[0]["dims"], json!({"w": "10", "h": null}));
    }

    #[test]
    fn test_query_body_uses_named_parameters() {
        let body = QueryBody {
            query: "SELECT @month",
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
            max_results: None,
            parameter_mode: Some("NAMED"),
            query_parameters: vec![json!({"name": "month"})],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["useLegacySql"], json!(false));
        assert_eq!(v["parameterMode"], json!("NAMED"));
        assert!(v.get("maxResults").is_none());
    }
}
