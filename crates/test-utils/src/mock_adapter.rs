// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Mock adapter implementation for testing
//!
//! Provides an in-memory adapter with builder pattern for easy test setup.
//! Every call is counted so tests can assert how the service used it.

use data_analyst_adapter::{
    AdapterError, AdapterResult, DataStoreAdapter, EngineKind, Introspection, QueryOutput, Row,
};
use data_analyst_schema::Table;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory mock adapter for testing
#[derive(Debug)]
pub struct MockAdapter {
    engine: EngineKind,
    tables: Mutex<Vec<Table>>,
    failing_units: Mutex<Vec<(String, String)>>,
    introspection_error: Mutex<Option<AdapterError>>,
    responses: Mutex<HashMap<String, AdapterResult<QueryOutput>>>,
    executed: Mutex<Vec<String>>,
    execute_calls: AtomicUsize,
    introspect_calls: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new(EngineKind::Sqlite)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAdapter {
    /// Create an empty mock for `engine`
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            tables: Mutex::new(Vec::new()),
            failing_units: Mutex::new(Vec::new()),
            introspection_error: Mutex::new(None),
            responses: Mutex::new(HashMap::new()),
            executed: Mutex::new(Vec::new()),
            execute_calls: AtomicUsize::new(0),
            introspect_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the tables the next introspection reports
    pub fn set_tables(&self, tables: impl IntoIterator<Item = Table>) {
        *lock(&self.tables) = tables.into_iter().collect();
    }

    /// Make the next introspections fail as a whole
    pub fn fail_introspection(&self, error: AdapterError) {
        *lock(&self.introspection_error) = Some(error);
    }

    /// Script the answer for `query` (matched after trimming)
    pub fn respond(&self, query: &str, output: AdapterResult<QueryOutput>) {
        lock(&self.responses).insert(query.trim().to_string(), output);
    }

    /// Statements passed to `execute`, in order
    pub fn executed_queries(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    pub fn execute_count(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn introspect_count(&self) -> usize {
        self.introspect_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DataStoreAdapter for MockAdapter {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    async fn execute(&self, query: &str) -> AdapterResult<QueryOutput> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(AdapterError::closed(self.engine));
        }

        lock(&self.executed).push(query.to_string());
        lock(&self.responses)
            .get(query.trim())
            .cloned()
            .unwrap_or_else(|| Ok(QueryOutput::Rows(Vec::new())))
    }

    async fn introspect(&self) -> AdapterResult<Introspection> {
        self.introspect_calls.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(AdapterError::closed(self.engine));
        }
        if let Some(error) = lock(&self.introspection_error).clone() {
            return Err(error);
        }

        let mut introspection = Introspection::new();
        for table in lock(&self.tables).iter() {
            introspection.push(table.clone());
        }
        for (unit, reason) in lock(&self.failing_units).iter() {
            introspection.skip(unit, reason);
        }
        Ok(introspection)
    }

    async fn close(&self) -> AdapterResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Builder for creating mock adapters with a fluent API
pub struct MockAdapterBuilder {
    adapter: MockAdapter,
}

impl Default for MockAdapterBuilder {
    fn default() -> Self {
        Self::new(EngineKind::Sqlite)
    }
}

impl MockAdapterBuilder {
    /// Create a new builder
    pub fn new(engine: EngineKind) -> Self {
        Self {
            adapter: MockAdapter::new(engine),
        }
    }

    /// Add a table to the reported schema
    pub fn with_table(self, table: Table) -> Self {
        lock(&self.adapter.tables).push(table);
        self
    }

    pub fn with_tables(self, tables: impl IntoIterator<Item = Table>) -> Self {
        lock(&self.adapter.tables).extend(tables);
        self
    }

    /// Add the standard relational schema (customers and orders)
    pub fn with_standard_schema(self) -> Self {
        self.with_tables(crate::fixtures::SchemaFixtures::shop())
    }

    /// Report `unit` as failing during introspection
    pub fn with_failing_unit(self, unit: &str, reason: &str) -> Self {
        lock(&self.adapter.failing_units).push((unit.to_string(), reason.to_string()));
        self
    }

    /// Answer `query` with `rows`
    pub fn with_rows(self, query: &str, rows: Vec<Row>) -> Self {
        self.adapter.respond(query, Ok(QueryOutput::Rows(rows)));
        self
    }

    /// Answer `query` with an affected-row count
    pub fn with_affected(self, query: &str, count: u64) -> Self {
        self.adapter.respond(query, Ok(QueryOutput::Affected(count)));
        self
    }

    /// Fail `query` with `error`
    pub fn with_error(self, query: &str, error: AdapterError) -> Self {
        self.adapter.respond(query, Err(error));
        self
    }

    pub fn build(self) -> MockAdapter {
        self.adapter
    }
}
