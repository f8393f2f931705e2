// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema cache
//!
//! In-memory view of the persisted schema, used to ground query generation.
//!
//! The cache never changes in place. A rebuild introspects the engine,
//! replaces every persisted unit, reloads the directory into a fresh
//! [`SchemaSnapshot`] and then swaps the shared pointer. Readers holding the
//! previous snapshot keep a complete, consistent view until they drop it.

use data_analyst_adapter::DataStoreAdapter;
use data_analyst_schema::{SchemaStore, Table};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::AnalystResult;

/// Immutable set of tables published by one load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSnapshot {
    tables: IndexMap<String, Table>,
    generation: u64,
}

impl SchemaSnapshot {
    pub fn new(tables: IndexMap<String, Table>, generation: u64) -> Self {
        Self { tables, generation }
    }

    pub fn tables(&self) -> &IndexMap<String, Table> {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of loads before this one; zero means nothing was ever loaded
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a load has happened, even one that found no tables
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }

    /// The schema as a JSON object keyed by table name
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.tables).unwrap_or_default()
    }
}

/// Outcome of a rebuild
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    /// Loaded tables, in cache order
    pub tables: Vec<String>,
    /// Units the engine could not describe, with the reason
    pub skipped: Vec<String>,
    #[serde(skip)]
    pub generation: u64,
}

impl RebuildReport {
    pub fn message(&self) -> String {
        format!("Successfully loaded schema for {} tables", self.tables.len())
    }
}

/// Shared schema cache backed by a [`SchemaStore`]
#[derive(Debug)]
pub struct SchemaCache {
    store: SchemaStore,
    current: RwLock<Arc<SchemaSnapshot>>,
    /// Serializes rebuilds and loads so two writers never interleave on disk
    rebuild_lock: Mutex<()>,
}

impl SchemaCache {
    pub fn new(store: SchemaStore) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(SchemaSnapshot::default())),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    /// The currently published snapshot
    pub async fn snapshot(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Load whatever the store holds, without introspecting
    pub async fn load(&self) -> AnalystResult<Arc<SchemaSnapshot>> {
        let _guard = self.rebuild_lock.lock().await;
        let tables = self.store.load_all()?;
        Ok(self.publish(tables).await)
    }

    /// Introspect `adapter`, persist the result and reload it
    ///
    /// On error the previous snapshot stays published. The persisted units
    /// may already have been replaced when the failure happens after the
    /// write step.
    pub async fn rebuild(&self, adapter: &dyn DataStoreAdapter) -> AnalystResult<RebuildReport> {
        let _guard = self.rebuild_lock.lock().await;
        info!(engine = %adapter.engine(), root = %self.store.root().display(), "Rebuilding schema");

        let introspection = adapter.introspect().await?;
        debug!(
            tables = introspection.tables.len(),
            skipped = introspection.skipped.len(),
            "Introspection finished"
        );

        self.store.replace_all(&introspection.tables)?;
        let tables = self.store.load_all()?;
        let snapshot = self.publish(tables).await;

        let report = RebuildReport {
            tables: snapshot.table_names(),
            skipped: introspection.skipped.iter().map(ToString::to_string).collect(),
            generation: snapshot.generation(),
        };
        info!(
            tables = report.tables.len(),
            skipped = report.skipped.len(),
            generation = report.generation,
            "Schema rebuilt"
        );
        Ok(report)
    }

    async fn publish(&self, tables: IndexMap<String, Table>) -> Arc<SchemaSnapshot> {
        let mut current = self.current.write().await;
        let snapshot = Arc::new(SchemaSnapshot::new(tables, current.generation() + 1));
        *current = Arc::clone(&snapshot);
        snapshot
    }
}
