// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data Analyst
//!
//! Natural-language querying over any engine supported by
//! `data-analyst-adapter`.
//!
//! ## Flow
//!
//! ```text
//! adapter.introspect() ──► SchemaStore (one JSON unit per table)
//!                                │
//!                                ▼
//!                           SchemaCache ──► instructions ──► TextGenerator
//!                                                                 │
//!                         sanitize ◄──────────────────────────────┘
//!                            │
//!                            ▼
//!                        validate ──► ExecutionGateway ──► adapter.execute()
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use data_analyst::{AnalystConfig, DataAnalyst};
//!
//! let config = AnalystConfig::from_yaml_file("analyst.yaml")?;
//! let analyst = DataAnalyst::new(&config)?;
//! analyst.rebuild_schema().await;
//! let envelope = analyst.query_with_prompt("ten most recent orders").await;
//! println!("{}", envelope.to_json_pretty());
//! analyst.shutdown().await?;
//! ```

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod holder;
pub mod pipeline;
pub mod service;

pub use cache::{RebuildReport, SchemaCache, SchemaSnapshot};
pub use config::{AnalystConfig, ConfigError, LlmConfig};
pub use envelope::Envelope;
pub use error::{AnalystError, AnalystResult};
pub use gateway::{ExecutionGateway, QueryData};
pub use holder::{AdapterFactory, AdapterHolder, ConfigAdapterFactory};
pub use pipeline::{
    GenerationRequest, OpenAiGenerator, QueryPipeline, QueryValidator, TextGenerator,
    ValidationPolicy,
};
pub use service::DataAnalyst;
