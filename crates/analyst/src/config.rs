// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Analyst Configuration
//!
//! This module provides configuration management for the analyst service.
//!
//! ## Configuration Structure
//!
//! The service configuration includes:
//! - Data store connection settings ([`ConnectionConfig`])
//! - Text-generation client settings ([`LlmConfig`])
//! - The directory holding persisted schema units
//! - The query validation policy
//!
//! ## Example
//!
//! ```rust,ignore
//! use data_analyst::AnalystConfig;
//!
//! let config = AnalystConfig::from_yaml_str(r#"
//! connection:
//!   engine: postgresql
//!   host: db.internal
//!   database: shop
//! llm:
//!   api_key: sk-test
//! "#)?;
//! config.validate()?;
//! ```

use data_analyst_adapter::{AdapterError, ConnectionConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::pipeline::ValidationPolicy;

/// Text-generation client settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Bearer token for the chat-completions endpoint
    pub api_key: String,

    /// Model name sent with every request
    pub model: String,

    /// Base URL of an OpenAI-compatible API
    pub api_url: String,

    /// Sampling temperature; low values favor repeatable queries
    pub temperature: f32,

    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            api_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.1,
            max_tokens: 500,
        }
    }
}

impl LlmConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Main service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Data store to query
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    /// Directory for persisted schema units
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,

    #[serde(default)]
    pub validation: ValidationPolicy,
}

fn default_schema_dir() -> PathBuf {
    PathBuf::from("./schema")
}

impl AnalystConfig {
    /// Create a configuration with default LLM, schema and validation settings
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            llm: LlmConfig::default(),
            schema_dir: default_schema_dir(),
            validation: ValidationPolicy::default(),
        }
    }

    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_schema_dir(mut self, schema_dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = schema_dir.into();
        self
    }

    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::InvalidFile {
            reason: e.to_string(),
        })
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidFile {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration
    ///
    /// Checks that:
    /// - An API key is present
    /// - The connection has what its engine needs
    /// - Sampling settings are in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidLlmSettings {
                reason: format!("temperature {} is outside [0, 2]", self.llm.temperature),
            });
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::InvalidLlmSettings {
                reason: "max_tokens must be > 0".to_string(),
            });
        }

        if self.llm.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidLlmSettings {
                reason: "api_url is required".to_string(),
            });
        }

        if self.connection.sampling.sample_size == 0 {
            return Err(ConfigError::InvalidConnection {
                reason: "document sample size must be at least 1".to_string(),
            });
        }

        self.connection.validate().map_err(|e| match e {
            AdapterError::Config(reason) => ConfigError::InvalidConnection { reason },
            other => ConfigError::InvalidConnection {
                reason: other.to_string(),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Missing text-generation credential
    #[error("LLM API key is required")]
    MissingApiKey,

    /// Invalid text-generation settings
    #[error("Invalid LLM configuration: {reason}")]
    InvalidLlmSettings { reason: String },

    /// Invalid data store settings
    #[error("Invalid connection configuration: {reason}")]
    InvalidConnection { reason: String },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration file: {reason}")]
    InvalidFile { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_analyst_adapter::{EngineKind, SamplingPolicy};

    fn valid_config() -> AnalystConfig {
        AnalystConfig::new(ConnectionConfig::new(EngineKind::MySql).with_database("shop"))
            .with_llm(LlmConfig::default().with_api_key("sk-test"))
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_api_key() {
        let config = valid_config().with_llm(LlmConfig::default());
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_missing_database_name() {
        let mut config = valid_config();
        config.connection.database.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConnection { reason }) if reason.contains("database")
        ));
    }

    #[test]
    fn test_sqlite_needs_path_not_database() {
        let mut config = valid_config();
        config.connection = ConnectionConfig::new(EngineKind::Sqlite);
        assert!(config.validate().is_err());

        config.connection = config.connection.with_path("shop.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = valid_config();
        config.llm.temperature = 2.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLlmSettings { .. })
        ));
    }

    #[test]
    fn test_zero_sample_size() {
        let config = AnalystConfig::new(
            ConnectionConfig::new(EngineKind::MongoDb)
                .with_database("app")
                .with_sampling(SamplingPolicy {
                    sample_size: 0,
                    ..SamplingPolicy::default()
                }),
        )
        .with_llm(LlmConfig::default().with_api_key("sk-test"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConnection { .. })
        ));
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = AnalystConfig::from_yaml_str(
            "connection:\n  engine: postgres\n  database: shop\nllm:\n  api_key: sk-test\n",
        )
        .unwrap();

        assert_eq!(config.connection.engine, EngineKind::PostgreSql);
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.schema_dir, PathBuf::from("./schema"));
        assert!(config.validation.allow_cte);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_rejects_unknown_engine() {
        let result = AnalystConfig::from_yaml_str("connection:\n  engine: oracle\n");
        assert!(matches!(result, Err(ConfigError::InvalidFile { .. })));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("sk-test"));
        assert!(rendered.contains("<redacted>"));
    }
}
