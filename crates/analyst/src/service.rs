// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Analyst service
//!
//! [`DataAnalyst`] wires the adapter holder, schema cache, generation
//! pipeline and execution gateway together. Its envelope-returning methods
//! are the surface callers use; they never return an error directly.

use data_analyst_adapter::QueryLanguage;
use data_analyst_schema::SchemaStore;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{RebuildReport, SchemaCache, SchemaSnapshot};
use crate::config::AnalystConfig;
use crate::envelope::Envelope;
use crate::error::{AnalystError, AnalystResult};
use crate::gateway::{ExecutionGateway, QueryData};
use crate::holder::AdapterHolder;
use crate::pipeline::{OpenAiGenerator, QueryPipeline, TextGenerator};

/// Natural-language query service over one data store
#[derive(Debug)]
pub struct DataAnalyst {
    holder: Arc<AdapterHolder>,
    cache: SchemaCache,
    pipeline: QueryPipeline,
    gateway: ExecutionGateway,
}

impl DataAnalyst {
    /// Build the service from validated configuration
    ///
    /// No connection is opened here; the adapter is created on first use.
    pub fn new(config: &AnalystConfig) -> AnalystResult<Self> {
        config.validate()?;

        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(&config.llm)?);
        let pipeline = QueryPipeline::new(
            generator,
            config.connection.engine.query_language(),
            config.validation,
        )
        .with_sampling(&config.llm);

        Ok(Self::from_parts(
            AdapterHolder::from_config(config.connection.clone()),
            SchemaStore::new(config.schema_dir.clone()),
            pipeline,
        ))
    }

    /// Assemble the service from already built components
    pub fn from_parts(holder: AdapterHolder, store: SchemaStore, pipeline: QueryPipeline) -> Self {
        let holder = Arc::new(holder);
        Self {
            gateway: ExecutionGateway::new(Arc::clone(&holder)),
            cache: SchemaCache::new(store),
            holder,
            pipeline,
        }
    }

    pub fn language(&self) -> QueryLanguage {
        self.pipeline.language()
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn holder(&self) -> &AdapterHolder {
        &self.holder
    }

    /// Generate a validated query without running it
    pub async fn generate_query(&self, prompt: &str) -> AnalystResult<String> {
        let schema = self.cache.snapshot().await;
        if !schema.is_loaded() {
            warn!("Generating a query without a loaded schema");
        }
        self.pipeline.generate(&schema, prompt).await
    }

    /// Validate and run `query`
    pub async fn run_query(&self, query: &str) -> AnalystResult<QueryData> {
        self.pipeline.validator().validate(query)?;
        self.gateway.execute(query).await
    }

    /// Introspect the engine and replace the persisted and cached schema
    pub async fn rebuild(&self) -> AnalystResult<RebuildReport> {
        let adapter = self.holder.get().await?;
        self.cache.rebuild(adapter.as_ref()).await
    }

    /// The loaded schema
    ///
    /// # Errors
    ///
    /// `AnalystError::SchemaNotLoaded` before the first load. A load that
    /// found no tables counts as loaded.
    pub async fn loaded_schema(&self) -> AnalystResult<Arc<SchemaSnapshot>> {
        let schema = self.cache.snapshot().await;
        if schema.is_loaded() {
            Ok(schema)
        } else {
            Err(AnalystError::SchemaNotLoaded)
        }
    }

    /// Generate a query for `prompt`, validate it and run it
    pub async fn query_with_prompt(&self, prompt: &str) -> Envelope {
        let query = match self.generate_query(prompt).await {
            Ok(query) => query,
            Err(error) => return self.failure(&error),
        };

        match self.gateway.execute(&query).await {
            Ok(data) => Envelope::success(data).with_query(query),
            Err(error) => self.failure(&error),
        }
    }

    /// Validate and run a caller-supplied statement
    pub async fn execute_query(&self, query: &str) -> Envelope {
        match self.run_query(query).await {
            Ok(data) => Envelope::success(data).with_query(query),
            Err(error) => self.failure(&error),
        }
    }

    /// The cached schema, keyed by table name
    pub async fn schema(&self) -> Envelope {
        match self.loaded_schema().await {
            Ok(schema) => Envelope::success(schema.to_json()),
            Err(error) => self.failure(&error),
        }
    }

    /// Rebuild the schema and report what was loaded
    pub async fn rebuild_schema(&self) -> Envelope {
        match self.rebuild().await {
            Ok(report) => Envelope::success(json!({
                "message": report.message(),
                "tables": report.tables,
                "skipped": report.skipped,
            })),
            Err(error) => self.failure(&error),
        }
    }

    /// Close the adapter if it was ever created
    pub async fn shutdown(&self) -> AnalystResult<()> {
        if self.holder.shutdown().await? {
            info!("Data analyst shut down");
        }
        Ok(())
    }

    fn failure(&self, error: &AnalystError) -> Envelope {
        warn!(%error, "Request failed");
        Envelope::from_error(error)
    }
}
