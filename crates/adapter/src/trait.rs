// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Adapter trait for data store abstraction
//!
//! This module defines the async [`DataStoreAdapter`] trait every engine
//! implements, and the [`Introspection`] result of a schema build.

use async_trait::async_trait;
use data_analyst_schema::Table;
use tracing::warn;

use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};
use crate::value::QueryOutput;

/// Data store adapter trait
///
/// An adapter owns one session with its engine. Calls on the same adapter are
/// serialized; independent adapters do not share state.
///
/// # Examples
///
/// ```rust,ignore
/// use data_analyst_adapter::{DataStoreAdapter, QueryOutput};
///
/// async fn count_rows(adapter: &dyn DataStoreAdapter) -> AdapterResult<usize> {
///     match adapter.execute("SELECT * FROM users").await? {
///         QueryOutput::Rows(rows) => Ok(rows.len()),
///         QueryOutput::Affected(_) => Ok(0),
///     }
/// }
/// ```
#[async_trait]
pub trait DataStoreAdapter: Send + Sync {
    /// Engine this adapter talks to
    fn engine(&self) -> EngineKind;

    /// Execute one statement in the engine's query language
    ///
    /// Retrieval statements yield [`QueryOutput::Rows`]; statements without a
    /// result set yield [`QueryOutput::Affected`].
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Execution` if the engine rejects the statement,
    /// `AdapterError::Parse` for malformed document-store syntax and
    /// `AdapterError::Connection` once the adapter is closed.
    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput>;

    /// Read the structural description of every unit in the data store
    ///
    /// Units that fail individually are reported in
    /// [`Introspection::skipped`] instead of failing the whole build.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::SchemaBuild` when the unit listing itself fails.
    async fn introspect(&self) -> AdapterResult<Introspection>;

    /// Release the engine session
    ///
    /// Closing twice is a no-op.
    async fn close(&self) -> AdapterResult<()>;
}

/// Tables produced by one introspection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Introspection {
    pub tables: Vec<Table>,
    /// Units that could not be described
    pub skipped: Vec<AdapterError>,
}

impl Introspection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: Table) {
        self.tables.push(table);
    }

    /// Record a unit that failed, logging it
    pub fn skip(&mut self, unit: &str, reason: impl ToString) {
        let error = AdapterError::schema_build(unit, reason);
        warn!(%error, "Skipping unit during schema build");
        self.skipped.push(error);
    }

    /// Record the outcome of describing one unit
    pub fn record(&mut self, unit: &str, result: AdapterResult<Table>) {
        match result {
            Ok(table) => self.push(table),
            Err(AdapterError::SchemaBuild { reason, .. }) => self.skip(unit, reason),
            Err(other) => self.skip(unit, other),
        }
    }

    /// Names of the skipped units
    pub fn skipped_units(&self) -> Vec<&str> {
        self.skipped
            .iter()
            .filter_map(|e| match e {
                AdapterError::SchemaBuild { unit, .. } => Some(unit.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_splits_successes_and_failures() {
        let mut introspection = Introspection::new();
        introspection.record("users", Ok(Table::new("users")));
        introspection.record(
            "broken",
            Err(AdapterError::Execution("permission denied".to_string())),
        );
        introspection.record("gone", Err(AdapterError::schema_build("gone", "dropped")));

        assert_eq!(introspection.tables.len(), 1);
        assert_eq!(introspection.skipped_units(), vec!["broken", "gone"]);
        assert!(introspection.skipped[0].to_string().contains("permission denied"));
        assert_eq!(
            introspection.skipped[1],
            AdapterError::schema_build("gone", "dropped")
        );
    }
}
