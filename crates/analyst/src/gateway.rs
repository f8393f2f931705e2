// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Execution gateway

use data_analyst_adapter::{QueryOutput, Row};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AnalystError, AnalystResult};
use crate::holder::AdapterHolder;

/// Normalized execution result
///
/// Serializes as a JSON array of row objects, or as
/// `{"affected_rows": n}` for statements without a result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    Rows(Vec<Row>),
    Affected { affected_rows: u64 },
}

impl QueryData {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryData::Rows(rows) => Some(rows),
            QueryData::Affected { .. } => None,
        }
    }
}

impl From<QueryOutput> for QueryData {
    fn from(output: QueryOutput) -> Self {
        match output {
            QueryOutput::Rows(rows) => QueryData::Rows(rows),
            QueryOutput::Affected(affected_rows) => QueryData::Affected { affected_rows },
        }
    }
}

/// Runs validated statements on the active adapter
#[derive(Debug, Clone)]
pub struct ExecutionGateway {
    holder: Arc<AdapterHolder>,
}

impl ExecutionGateway {
    pub fn new(holder: Arc<AdapterHolder>) -> Self {
        Self { holder }
    }

    /// Execute `query`, creating the adapter on first use
    ///
    /// # Errors
    ///
    /// Adapter construction failures pass through unchanged; engine failures
    /// become `AnalystError::Execution` carrying `query`.
    pub async fn execute(&self, query: &str) -> AnalystResult<QueryData> {
        let adapter = self.holder.get().await?;
        let output = adapter
            .execute(query)
            .await
            .map_err(|source| AnalystError::Execution {
                query: query.to_string(),
                source,
            })?;

        let data = QueryData::from(output);
        match &data {
            QueryData::Rows(rows) => {
                debug!(engine = %adapter.engine(), rows = rows.len(), "Query returned rows")
            }
            QueryData::Affected { affected_rows } => {
                debug!(engine = %adapter.engine(), affected_rows, "Statement executed")
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_analyst_adapter::Value;
    use serde_json::json;

    #[test]
    fn test_query_data_shapes() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Integer(1));
        row.insert("name".to_string(), Value::from("Ada"));

        let rows = QueryData::from(QueryOutput::Rows(vec![row]));
        assert_eq!(serde_json::to_value(&rows).unwrap(), json!([{"id": 1, "name": "Ada"}]));
        assert_eq!(rows.rows().map(<[Row]>::len), Some(1));

        let affected = QueryData::from(QueryOutput::Affected(3));
        assert_eq!(serde_json::to_value(&affected).unwrap(), json!({"affected_rows": 3}));
        assert!(affected.rows().is_none());
    }
}
