// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Connection configuration
//!
//! One [`ConnectionConfig`] describes how to reach any supported engine.
//! Settings an engine does not use are ignored by it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::document::SamplingPolicy;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};

/// Engine connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Target engine
    pub engine: EngineKind,

    #[serde(default = "default_host")]
    pub host: String,

    /// Explicit port; the engine default applies when absent
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database, catalog or keyspace name
    #[serde(default)]
    pub database: String,

    /// URL scheme for HTTP engines
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Database file for SQLite
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// PostgreSQL schema to introspect
    #[serde(default = "default_pg_schema")]
    pub schema: String,

    /// ODBC driver name for SSAS
    #[serde(default = "default_odbc_driver")]
    pub odbc_driver: String,

    /// Document sampling for schema inference
    #[serde(default)]
    pub sampling: SamplingPolicy,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_pg_schema() -> String {
    "public".to_string()
}

fn default_odbc_driver() -> String {
    "ODBC Driver 17 for SQL Server".to_string()
}

impl ConnectionConfig {
    /// Create a configuration with defaults for `engine`
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            host: default_host(),
            port: None,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            scheme: default_scheme(),
            path: None,
            schema: default_pg_schema(),
            odbc_driver: default_odbc_driver(),
            sampling: SamplingPolicy::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingPolicy) -> Self {
        self.sampling = sampling;
        self
    }

    /// Configured port, falling back to the engine default
    pub fn port_or_default(&self) -> u16 {
        self.port.or(self.engine.default_port()).unwrap_or_default()
    }

    /// Whether a user name was supplied
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }

    /// Base URL for HTTP engines, without a trailing slash
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port_or_default())
    }

    /// Check the settings the selected engine needs
    pub fn validate(&self) -> AdapterResult<()> {
        if self.engine == EngineKind::Sqlite {
            match &self.path {
                Some(path) if !path.as_os_str().is_empty() => {}
                _ => {
                    return Err(AdapterError::Config(
                        "sqlite requires a database file path".to_string(),
                    ));
                }
            }
        } else if self.host.trim().is_empty() {
            return Err(AdapterError::Config(format!("{} requires a host", self.engine)));
        }

        if self.engine.requires_database() && self.database.trim().is_empty() {
            return Err(AdapterError::Config(format!(
                "{} requires a database name",
                self.engine
            )));
        }

        if self.engine.is_http() && !matches!(self.scheme.as_str(), "http" | "https") {
            return Err(AdapterError::Config(format!(
                "unsupported URL scheme '{}', expected http or https",
                self.scheme
            )));
        }

        if self.engine == EngineKind::MongoDb && self.sampling.sample_size == 0 {
            return Err(AdapterError::Config(
                "document sample size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .field("scheme", &self.scheme)
            .field("path", &self.path)
            .field("schema", &self.schema)
            .field("odbc_driver", &self.odbc_driver)
            .field("sampling", &self.sampling)
            .finish()
    }
}
