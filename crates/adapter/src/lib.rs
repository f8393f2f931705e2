// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data Analyst - Adapter Layer
//!
//! This crate puts every supported data store behind one async
//! [`DataStoreAdapter`] trait:
//!
//! - **Relational**: MySQL, PostgreSQL, SQL Server, SQLite
//! - **Document**: MongoDB (schema inferred by sampling)
//! - **Search index**: Elasticsearch (SQL endpoint, index mappings)
//! - **Time series**: InfluxDB 1.x (InfluxQL)
//! - **OLAP**: SQL Server Analysis Services (MDX over ODBC)
//!
//! Each engine is behind a cargo feature of the same name. All but `ssas`
//! are enabled by default.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use data_analyst_adapter::{ConnectionConfig, EngineKind, factory};
//!
//! let config = ConnectionConfig::new(EngineKind::Sqlite).with_path("shop.db");
//! let adapter = factory::connect(&config).await?;
//! let introspection = adapter.introspect().await?;
//! for table in &introspection.tables {
//!     println!("{} ({} columns)", table.name, table.len());
//! }
//! adapter.close().await?;
//! ```
//!
//! Query results are normalized into [`Value`] rows so they serialize to
//! plain JSON whatever the engine.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod factory;
pub mod mongo_query;
pub mod olap;
pub mod relational;
pub mod statement;
pub mod r#trait;
pub mod value;

#[cfg(any(feature = "mysql", feature = "postgresql", feature = "sqlite"))]
mod sql_support;

#[cfg(any(feature = "elasticsearch", feature = "influxdb"))]
mod http_support;

#[cfg(feature = "elasticsearch")]
pub mod live_elasticsearch;
#[cfg(feature = "influxdb")]
pub mod live_influxdb;
#[cfg(feature = "mongodb")]
pub mod live_mongodb;
#[cfg(feature = "mssql")]
pub mod live_mssql;
#[cfg(feature = "mysql")]
pub mod live_mysql;
#[cfg(feature = "postgresql")]
pub mod live_postgres;
#[cfg(feature = "sqlite")]
pub mod live_sqlite;
#[cfg(feature = "ssas")]
pub mod live_ssas;

pub use config::ConnectionConfig;
pub use document::SamplingPolicy;
pub use engine::{EngineKind, QueryLanguage};
pub use error::{AdapterError, AdapterResult};
pub use r#trait::{DataStoreAdapter, Introspection};
pub use value::{QueryOutput, Row, Value};

// Re-export the schema model so adapter users need one import path
pub use data_analyst_schema::{Column, Table};
