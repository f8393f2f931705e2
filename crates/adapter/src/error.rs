// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for adapter operations
//!
//! Driver errors never cross this boundary as their own types; every adapter
//! stringifies them into one of the variants below with the operation that
//! was in progress.

use thiserror::Error;

/// Result type alias for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur while talking to a data store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// A required setting is missing or malformed
    #[error("Invalid adapter configuration: {0}")]
    Config(String),

    /// The engine session could not be established or is gone
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Introspection failed for one unit or for the whole engine
    #[error("Schema build failed for '{unit}': {reason}")]
    SchemaBuild { unit: String, reason: String },

    /// A submitted query failed at the engine
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// Document-store operation syntax is malformed or unsupported
    #[error("Invalid operation syntax: {0}")]
    Parse(String),
}

impl AdapterError {
    /// Create a schema build error for `unit`
    pub fn schema_build(unit: impl Into<String>, reason: impl ToString) -> Self {
        Self::SchemaBuild {
            unit: unit.into(),
            reason: reason.to_string(),
        }
    }

    /// Error returned by adapters used after `close`
    pub fn closed(engine: impl std::fmt::Display) -> Self {
        Self::Connection(format!("{engine} adapter is closed"))
    }
}
