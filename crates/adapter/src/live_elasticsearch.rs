// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Live Elasticsearch adapter
//!
//! Queries run through the SQL endpoint; each index is described from its
//! mapping. Only the first page of a SQL result is returned and any cursor
//! left open is released.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

use data_analyst_schema::{Column, Table};

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::http_support::{HttpEndpoint, send_json};
use crate::r#trait::{DataStoreAdapter, Introspection};
use crate::value::{QueryOutput, Row, Value};

/// Live Elasticsearch adapter
pub struct LiveElasticsearchAdapter {
    endpoint: HttpEndpoint,
}

#[derive(Debug, Deserialize)]
struct SqlColumn {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SqlResponse {
    #[serde(default)]
    columns: Vec<SqlColumn>,
    #[serde(default)]
    rows: Vec<Vec<JsonValue>>,
    cursor: Option<String>,
}

impl LiveElasticsearchAdapter {
    /// Connect and verify the cluster answers
    pub async fn connect(config: &ConnectionConfig) -> AdapterResult<Self> {
        let endpoint = HttpEndpoint::new(config)?;
        let cluster = send_json(endpoint.request(Method::GET, "/")?)
            .await
            .map_err(|e| {
                AdapterError::Connection(format!(
                    "Failed to connect to Elasticsearch at {}: {}",
                    endpoint.base_url(),
                    e
                ))
            })?;
        info!(
            url = %endpoint.base_url(),
            version = cluster["version"]["number"].as_str().unwrap_or("unknown"),
            "Connected to Elasticsearch"
        );
        Ok(Self { endpoint })
    }

    async fn release_cursor(&self, cursor: String) {
        let request = match self.endpoint.request(Method::POST, "/_sql/close") {
            Ok(request) => request.json(&json!({ "cursor": cursor })),
            Err(_) => return,
        };
        if let Err(e) = send_json(request).await {
            debug!(error = %e, "Failed to release SQL cursor");
        }
    }
}

/// Zip SQL result columns with each row
fn sql_rows(response: SqlResponse) -> Vec<Row> {
    let names: Vec<String> = response.columns.into_iter().map(|c| c.name).collect();
    response
        .rows
        .into_iter()
        .map(|cells| {
            names
                .iter()
                .cloned()
                .zip(cells.into_iter().map(Value::from))
                .collect()
        })
        .collect()
}

/// Tables for every index in a `_mapping` response, sorted by index name
fn mapping_tables(mapping: &JsonValue) -> AdapterResult<Vec<(String, AdapterResult<Table>)>> {
    let indices = mapping.as_object().ok_or_else(|| {
        AdapterError::schema_build("_mapping", "mapping response is not an object")
    })?;

    let mut tables: Vec<_> = indices
        .iter()
        .map(|(index, body)| (index.clone(), index_table(index, body)))
        .collect();
    tables.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(tables)
}

fn index_table(index: &str, body: &JsonValue) -> AdapterResult<Table> {
    if !body.is_object() {
        return Err(AdapterError::schema_build(index, "index mapping is not an object"));
    }

    let properties = match body.pointer("/mappings/properties") {
        None | Some(JsonValue::Null) => return Ok(Table::new(index)),
        Some(JsonValue::Object(properties)) => properties,
        Some(_) => {
            return Err(AdapterError::schema_build(index, "mapping properties are not an object"));
        }
    };

    let columns = properties.iter().map(|(field, info)| {
        let data_type = info["type"].as_str().unwrap_or("object");
        Column::new(field.as_str(), data_type).with_nullable(true)
    });
    Ok(Table::new(index).with_columns(columns))
}

#[async_trait]
impl DataStoreAdapter for LiveElasticsearchAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Elasticsearch
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        let request = self
            .endpoint
            .request(Method::POST, "/_sql?format=json")?
            .json(&json!({ "query": query }));
        let body = send_json(request).await.map_err(AdapterError::Execution)?;
        let mut response: SqlResponse = serde_json::from_value(body)
            .map_err(|e| AdapterError::Execution(format!("unexpected SQL response: {e}")))?;

        if let Some(cursor) = response.cursor.take() {
            debug!("Returning first page of a paged SQL result");
            self.release_cursor(cursor).await;
        }

        let rows = sql_rows(response);
        debug!(rows = rows.len(), "Elasticsearch query returned rows");
        Ok(QueryOutput::Rows(rows))
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        let mapping = send_json(self.endpoint.request(Method::GET, "/*/_mapping")?)
            .await
            .map_err(|e| AdapterError::schema_build("_mapping", e))?;

        let mut introspection = Introspection::new();
        for (index, table) in mapping_tables(&mapping)? {
            introspection.record(&index, table);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        if self.endpoint.close() {
            info!("Closed Elasticsearch adapter");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_rows_zip_columns() {
        let response: SqlResponse = serde_json::from_value(json!({
            "columns": [{"name": "city", "type": "keyword"}, {"name": "n", "type": "long"}],
            "rows": [["Paris", 3], ["Oslo", 1]]
        }))
        .unwrap();

        let rows = sql_rows(response);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["city"], Value::Text("Paris".to_string()));
        assert_eq!(rows[1]["n"], Value::Integer(1));
    }

    #[test]
    fn test_mapping_tables() {
        let mapping = json!({
            "logs": {"mappings": {"properties": {
                "message": {"type": "text"},
                "host": {"properties": {"name": {"type": "keyword"}}}
            }}},
            "empty": {"mappings": {}},
            "broken": "nope"
        });

        let tables = mapping_tables(&mapping).unwrap();
        let names: Vec<_> = tables.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["broken", "empty", "logs"]);

        assert!(tables[0].1.is_err());
        assert!(tables[1].1.as_ref().unwrap().is_empty());

        let logs = tables[2].1.as_ref().unwrap();
        assert_eq!(logs.column("message").unwrap().data_type, "text");
        let host = logs.column("host").unwrap();
        assert_eq!(host.data_type, "object");
        assert!(host.is_nullable);
        assert!(logs.primary_keys().is_empty());
    }

    #[test]
    fn test_mapping_without_indices() {
        assert!(mapping_tables(&json!({})).unwrap().is_empty());
        assert!(mapping_tables(&json!([])).is_err());
    }
}
