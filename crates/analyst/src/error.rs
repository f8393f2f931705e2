// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for the analyst service
//!
//! [`AnalystError`] is what every service-level operation returns. Top-level
//! entry points never surface it directly; they translate it into an
//! [`Envelope`](crate::envelope::Envelope).

use data_analyst_adapter::AdapterError;
use data_analyst_schema::SchemaError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for analyst operations
pub type AnalystResult<T> = Result<T, AnalystError>;

/// Errors raised by the analyst service
#[derive(Debug, Error)]
pub enum AnalystError {
    /// Settings are missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Adapter construction, connection or introspection failed
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// The persisted schema could not be read or written
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Generated or submitted text is not an allowed retrieval statement
    #[error("Query rejected: {reason}")]
    QueryPolicyViolation { query: String, reason: String },

    /// The text-generation service failed
    #[error("Query generation failed: {0}")]
    Generation(String),

    /// A validated query failed at the engine
    #[error("{source}")]
    Execution {
        query: String,
        #[source]
        source: AdapterError,
    },

    /// No schema has been built yet
    #[error("Schema not loaded. Rebuild the schema definition first.")]
    SchemaNotLoaded,
}

impl AnalystError {
    pub(crate) fn policy(query: &str, reason: impl Into<String>) -> Self {
        Self::QueryPolicyViolation {
            query: query.to_string(),
            reason: reason.into(),
        }
    }

    /// Query the error is about, when there is one
    pub fn query(&self) -> Option<&str> {
        match self {
            AnalystError::QueryPolicyViolation { query, .. } | AnalystError::Execution { query, .. } => {
                Some(query)
            }
            _ => None,
        }
    }
}
