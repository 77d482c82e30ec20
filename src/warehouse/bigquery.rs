// tabletransfer/src/warehouse/bigquery.rs
//! Minimal BigQuery REST client: `jobs.query` plus `jobs.getQueryResults` paging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

use crate::errors::{Result, TransferError};
use crate::table::{Column, ColumnType, Table, Value};

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u32 = 10_000;
static NULL_CELL: JsonValue = JsonValue::Null;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub use_legacy_sql: bool,
    pub timeout_ms: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

/// Shared shape of the `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default)]
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub total_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

pub struct BigQueryClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl BigQueryClient {
    pub fn new(token: String) -> Self {
        Self::with_endpoint(token, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(token: String, endpoint: &str) -> Self {
        BigQueryClient {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Appends path segments to the endpoint, percent-encoding each one.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| {
                TransferError::WarehouseQuery(format!("endpoint {} cannot take a path", self.endpoint))
            })?
            .extend(segments);
        Ok(url)
    }

    /// Runs a legacy-SQL query billed to `project_id` and collects every result page.
    pub async fn query_to_table(&self, project_id: &str, sql: &str) -> Result<Table> {
        let request = QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: true,
            timeout_ms: QUERY_TIMEOUT_MS,
        };
        let url = self.endpoint_url(&["projects", project_id, "queries"])?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;
        let mut page: QueryResponse = decode_response(response).await?;

        let mut schema = page.schema.take();
        let mut rows = std::mem::take(&mut page.rows);
        let job = page.job_reference.take();
        let mut pages = 1usize;

        while !page.job_complete || page.page_token.is_some() {
            let job = job.as_ref().ok_or_else(|| {
                TransferError::WarehouseQuery("response carried no job reference".to_string())
            })?;
            let page_token = page.page_token.take();
            page = self.get_query_results(project_id, job, page_token.as_deref()).await?;
            if schema.is_none() {
                schema = page.schema.take();
            }
            rows.append(&mut page.rows);
            pages += 1;
        }

        tracing::debug!(pages, rows = rows.len(), total = ?page.total_rows, "warehouse query complete");

        let schema = schema.ok_or_else(|| {
            TransferError::WarehouseQuery("query finished without a result schema".to_string())
        })?;
        rows_to_table(&schema, rows)
    }

    async fn get_query_results(
        &self,
        project_id: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse> {
        let url = self.endpoint_url(&["projects", project_id, "queries", &job.job_id])?;
        let mut params: Vec<(&str, String)> = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&params)
            .send()
            .await?;
        decode_response(response).await
    }
}

async fn decode_response(response: reqwest::Response) -> Result<QueryResponse> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body)
        .map_err(|e| TransferError::WarehouseQuery(format!("unexpected response body: {}", e)))
}

fn api_error(status: u16, body: &str) -> TransferError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => TransferError::WarehouseQuery(format!(
            "{} (HTTP {})",
            parsed.error.message,
            if parsed.error.code != 0 { parsed.error.code } else { status }
        )),
        Err(_) => TransferError::WarehouseQuery(format!("HTTP {}: {}", status, body)),
    }
}

fn column_type_for(field: &TableFieldSchema) -> ColumnType {
    if field.mode.as_deref() == Some("REPEATED") {
        return ColumnType::Json;
    }
    match field.field_type.to_uppercase().as_str() {
        "BOOLEAN" | "BOOL" => ColumnType::Boolean,
        "INTEGER" | "INT64" => ColumnType::Integer,
        "FLOAT" | "FLOAT64" => ColumnType::Float,
        "NUMERIC" | "BIGNUMERIC" => ColumnType::Numeric,
        "STRING" => ColumnType::Text,
        "DATE" => ColumnType::Date,
        "DATETIME" => ColumnType::Timestamp,
        "TIMESTAMP" => ColumnType::TimestampTz,
        "RECORD" | "STRUCT" | "JSON" => ColumnType::Json,
        "BYTES" => ColumnType::Bytes,
        _ => ColumnType::Other,
    }
}

/// Converts REST rows (`{"f": [{"v": ...}]}`) into a typed table using the result schema.
pub fn rows_to_table(schema: &TableSchema, rows: Vec<TableRow>) -> Result<Table> {
    let columns: Vec<Column> = schema
        .fields
        .iter()
        .map(|field| Column::new(field.name.clone(), column_type_for(field)))
        .collect();
    let mut table = Table::new(columns);

    for row in rows {
        // surplus cells are a malformed response; missing trailing cells read as null
        if row.f.len() > table.num_columns() {
            return Err(TransferError::RowShape {
                expected: table.num_columns(),
                found: row.f.len(),
            });
        }
        let values = table
            .columns()
            .iter()
            .zip(row.f.iter().map(|cell| &cell.v).chain(std::iter::repeat(&NULL_CELL)))
            .map(|(column, raw)| convert_cell(column.column_type, raw))
            .collect::<Vec<_>>();
        table.push_row(values)?;
    }
    Ok(table)
}

fn convert_cell(column_type: ColumnType, raw: &JsonValue) -> Value {
    let text = match raw {
        JsonValue::Null => return Value::Null,
        JsonValue::String(s) => s.as_str(),
        nested => return Value::Text(flatten_nested(nested).to_string()),
    };

    match column_type {
        ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Text(text.to_string()),
        },
        ColumnType::Integer => text
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(text.to_string())),
        ColumnType::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(text.to_string())),
        ColumnType::TimestampTz => Value::Text(format_epoch_seconds(text).unwrap_or_else(|| text.to_string())),
        _ => Value::Text(text.to_string()),
    }
}

/// Unwraps the `{"v": ...}` / `{"f": [...]}` envelopes of repeated and record values.
fn flatten_nested(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(flatten_nested).collect()),
        JsonValue::Object(map) => {
            if let Some(inner) = map.get("v") {
                flatten_nested(inner)
            } else if let Some(JsonValue::Array(fields)) = map.get("f") {
                JsonValue::Array(fields.iter().map(flatten_nested).collect())
            } else {
                value.clone()
            }
        }
        other => other.clone(),
    }
}

/// TIMESTAMP cells arrive as (possibly fractional, possibly exponent-form) epoch seconds.
fn format_epoch_seconds(text: &str) -> Option<String> {
    let seconds: f64 = text.parse().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i64;
    let timestamp: DateTime<Utc> = DateTime::from_timestamp(
        micros.div_euclid(1_000_000),
        (micros.rem_euclid(1_000_000) * 1_000) as u32,
    )?;
    Some(timestamp.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
}
