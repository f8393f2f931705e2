// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for schema persistence

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for schema store operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while reading or writing persisted schema units
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Filesystem access failed
    #[error("Schema store I/O failed at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted unit could not be encoded or decoded
    #[error("Invalid schema unit '{}': {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SchemaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Serialization {
            path: path.into(),
            source,
        }
    }
}
