// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live InfluxDB adapter
//!
//! InfluxQL over the 1.x HTTP API. Every returned point becomes one row with
//! the series tags merged in and a `_measurement` field naming its series.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use data_analyst_schema::{Column, Table};

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::http_support::HttpEndpoint;
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::value::{QueryOutput, Row, Value};

/// Field added to every point naming its measurement
pub const MEASUREMENT_FIELD: &str = "_measurement";

#[derive(Debug, Default, Deserialize)]
struct InfluxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    name: String,
    #[serde(default)]
    tags: Map<String, JsonValue>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

/// Live InfluxDB adapter
pub struct LiveInfluxAdapter {
    database: String,
    endpoint: HttpEndpoint,
}

impl LiveInfluxAdapter {
    /// Connect and verify the server answers `/ping`
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let endpoint = HttpEndpoint::new(config)?;
        let connection_error = |reason: String| {
            AdapterError::Connection(format!(
                "Failed to connect to InfluxDB at {}: {}",
                endpoint.base_url(),
                reason
            ))
        };

        let response = endpoint
            .request(Method::GET, "/ping")?
            .send()
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(connection_error(format!("ping returned {}", response.status())));
        }
        let version = response
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        info!(url = %endpoint.base_url(), database = %config.database, version, "Connected to InfluxDB");

        Ok(Self {
            database: config.database.clone(),
            endpoint,
        })
    }

    async fn query(&self, query: &str) -> AdapterResult<Vec<Row>> {
        let response = self
            .endpoint
            .request(Method::POST, "/query")?
            .form(&[("db", self.database.as_str()), ("q", query)])
            .send()
            .await
            .map_err(|e| AdapterError::Execution(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Execution(e.to_string()))?;
        let parsed: InfluxResponse = serde_json::from_str(&body).map_err(|_| {
            AdapterError::Execution(format!("HTTP {status}: {}", body.trim()))
        })?;
        points_from_response(parsed)
    }
}

/// Flatten statement results into rows
fn points_from_response(response: InfluxResponse) -> AdapterResult<Vec<Row>> {
    if let Some(error) = response.error {
        return Err(AdapterError::Execution(error));
    }

    let mut rows = Vec::new();
    for result in response.results {
        if let Some(error) = result.error {
            return Err(AdapterError::Execution(error));
        }
        for series in result.series {
            for values in series.values {
                let mut row: Row = series
                    .columns
                    .iter()
                    .cloned()
                    .zip(values.into_iter().map(Value::from))
                    .collect();
                for (tag, value) in &series.tags {
                    row.insert(tag.clone(), Value::from(value.clone()));
                }
                row.insert(MEASUREMENT_FIELD.to_string(), Value::Text(series.name.clone()));
                rows.push(row);
            }
        }
    }
    Ok(rows)
}

/// Quote a measurement name for InfluxQL
fn quote_measurement(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Table for one measurement from its `SHOW FIELD KEYS` rows
fn measurement_table(name: &str, field_keys: &[Row]) -> Table {
    let columns = field_keys.iter().filter_map(|row| {
        let field = row.get("fieldKey")?.as_str()?;
        let data_type = row
            .get("fieldType")
            .and_then(Value::as_str)
            .unwrap_or("string");
        Some(Column::new(field, data_type).with_nullable(true))
    });
    Table::new(name).with_columns(columns)
}

#[async_trait]
impl DataStoreAdapter for LiveInfluxAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::InfluxDb
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let rows = self.query(query).await?;
        debug!(rows = rows.len(), "InfluxDB query returned points");
        Ok(QueryOutput::Rows(rows))
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let measurements = self
            .query("SHOW MEASUREMENTS")
            .await
            .map_err(|e| AdapterError::schema_build(&self.database, e))?;

        let mut introspection = Introspection::new();
        for name in measurements
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str))
        {
            let result = self
                .query(&format!("SHOW FIELD KEYS FROM {}", quote_measurement(name)))
                .await
                .map(|field_keys| measurement_table(name, &field_keys));
            introspection.record(name, result);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if self.endpoint.close() {
            info!("Closed InfluxDB adapter");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: JsonValue) -> InfluxResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_points_merge_tags_and_measurement() {
        let rows = points_from_response(response(json!({
            "results": [{
                "statement_id": 0,
                "series": [{
                    "name": "cpu",
                    "tags": {"host": "a"},
                    "columns": ["time", "usage"],
                    "values": [["2024-01-01T00:00:00Z", 0.5], ["2024-01-01T00:01:00Z", 0.75]]
                }]
            }]
        })))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["usage"], Value::Float(0.5));
        assert_eq!(rows[0]["host"], Value::Text("a".to_string()));
        assert_eq!(rows[1][MEASUREMENT_FIELD], Value::Text("cpu".to_string()));
        assert_eq!(
            rows[0].keys().collect::<Vec<_>>(),
            vec!["time", "usage", "host", MEASUREMENT_FIELD]
        );
    }

    #[test]
    fn test_statement_error_is_execution_error() {
        let err = points_from_response(response(json!({
            "results": [{"statement_id": 0, "error": "measurement not found"}]
        })))
        .unwrap_err();
        assert_eq!(err, AdapterError::Execution("measurement not found".to_string()));

        let err = points_from_response(response(json!({"error": "missing parameter: q"})))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Execution(_)));
    }

    #[test]
    fn test_empty_result() {
        let rows = points_from_response(response(json!({"results": [{"statement_id": 0}]}))).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_measurement_table() {
        let rows = points_from_response(response(json!({
            "results": [{"series": [{
                "name": "cpu",
                "columns": ["fieldKey", "fieldType"],
                "values": [["usage", "float"], ["count", "integer"]]
            }]}]
        })))
        .unwrap();

        let table = measurement_table("cpu", &rows);
        assert_eq!(table.column_names().collect::<Vec<_>>(), vec!["usage", "count"]);
        assert_eq!(table.column("count").unwrap().data_type, "integer");
        assert!(table.column("usage").unwrap().is_nullable);
    }

    #[test]
    fn test_quote_measurement() {
        assert_eq!(quote_measurement("cpu"), "\"cpu\"");
        assert_eq!(quote_measurement("disk \"io\""), "\"disk \\\"io\\\"\"");
    }
}
