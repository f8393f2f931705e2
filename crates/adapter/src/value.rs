// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Normalized result values
//!
//! Every engine converts its native result cells into [`Value`] so results
//! serialize to plain JSON regardless of where they came from. Engine types
//! without a JSON counterpart are rendered as text: temporal values as
//! ISO-8601, decimals in their exact decimal form, object identifiers as hex.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One result record, preserving column order
pub type Row = IndexMap<String, Value>;

/// A JSON-serializable result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Object(Row),
}

impl Value {
    /// Text value from raw bytes, replacing invalid UTF-8
    pub fn lossy_text(bytes: &[u8]) -> Self {
        Value::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Float),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Outcome of executing a statement
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Records returned by a retrieval statement
    Rows(Vec<Row>),
    /// Count of records changed by a statement without a result set
    Affected(u64),
}

impl QueryOutput {
    /// Records, or `None` for statements that returned none
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryOutput::Rows(rows) => Some(rows),
            QueryOutput::Affected(_) => None,
        }
    }
}
