// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Response envelope
//!
//! Every service entry point answers with an [`Envelope`]:
//!
//! ```json
//! { "success": true, "query": "SELECT ...", "data": [ ... ] }
//! { "success": false, "query": "DROP TABLE t", "error": "Query rejected: ..." }
//! ```
//!
//! `query` and `data` are omitted when they do not apply.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::AnalystError;

/// Success/error result of one service call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Successful call carrying `data`
    pub fn success(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: true,
                query: None,
                data: Some(data),
                error: None,
            },
            Err(e) => Self::failure(format!("Failed to encode result: {e}")),
        }
    }

    /// Failed call with a message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            query: None,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Failed call; the query an error refers to is carried over
    pub fn from_error(error: &AnalystError) -> Self {
        let envelope = Self::failure(error.to_string());
        match error.query() {
            Some(query) => envelope.with_query(query),
            None => envelope,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!("{{\n  \"success\": false,\n  \"error\": \"{e}\"\n}}")
        })
    }
}

impl<T: Serialize> From<Result<T, AnalystError>> for Envelope {
    fn from(result: Result<T, AnalystError>) -> Self {
        match result {
            Ok(data) => Envelope::success(data),
            Err(error) => Envelope::from_error(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_omits_absent_fields() {
        let envelope = Envelope::success(json!([{"id": 1}]));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "data": [{"id": 1}]})
        );
    }

    #[test]
    fn test_error_keeps_query() {
        let error = AnalystError::QueryPolicyViolation {
            query: "DROP TABLE t".to_string(),
            reason: "only SELECT statements are allowed, found 'DROP'".to_string(),
        };
        let envelope = Envelope::from(Err::<(), _>(error));

        assert!(!envelope.success);
        assert_eq!(envelope.query.as_deref(), Some("DROP TABLE t"));
        assert!(envelope.data.is_none());
        assert!(envelope.error.unwrap().starts_with("Query rejected"));
    }

    #[test]
    fn test_pretty_output_round_trips() {
        let envelope = Envelope::success(json!({"affected_rows": 2})).with_query("DELETE FROM t");
        let parsed: Envelope = serde_json::from_str(&envelope.to_json_pretty()).unwrap();
        assert_eq!(parsed, envelope);
    }
}
