// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query generation pipeline
//!
//! Turns a natural-language request into a statement the gateway may run:
//!
//! ```text
//! instructions (schema + rules) ──► generator ──► sanitize ──► validate ──► query
//!                                                                 │
//!                                                                 └──► rejected
//! ```
//!
//! A rejected statement is returned as an error and never executed.

pub mod generator;
pub mod prompt;
pub mod sanitize;
pub mod validate;

pub use generator::{GenerationRequest, OpenAiGenerator, TextGenerator};
pub use prompt::build_instructions;
pub use sanitize::sanitize;
pub use validate::{QueryValidator, ValidationPolicy};

use data_analyst_adapter::QueryLanguage;
use std::sync::Arc;
use tracing::debug;

use crate::cache::SchemaSnapshot;
use crate::config::LlmConfig;
use crate::error::AnalystResult;

/// Generation, sanitization and validation for one query language
#[derive(Clone)]
pub struct QueryPipeline {
    generator: Arc<dyn TextGenerator>,
    validator: QueryValidator,
    temperature: f32,
    max_tokens: u32,
}

impl QueryPipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        language: QueryLanguage,
        policy: ValidationPolicy,
    ) -> Self {
        let defaults = LlmConfig::default();
        Self {
            generator,
            validator: QueryValidator::new(language, policy),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Use the sampling settings of `llm`
    pub fn with_sampling(mut self, llm: &LlmConfig) -> Self {
        self.temperature = llm.temperature;
        self.max_tokens = llm.max_tokens;
        self
    }

    pub fn language(&self) -> QueryLanguage {
        self.validator.language()
    }

    pub fn validator(&self) -> &QueryValidator {
        &self.validator
    }

    /// The request sent to the generator for `prompt`
    pub fn request(&self, schema: &SchemaSnapshot, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            instructions: build_instructions(self.language(), schema),
            prompt: prompt.to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Generate a validated query for `prompt`
    ///
    /// # Errors
    ///
    /// `AnalystError::Generation` if the generator fails and
    /// `AnalystError::QueryPolicyViolation` if its answer is not an allowed
    /// retrieval statement.
    pub async fn generate(&self, schema: &SchemaSnapshot, prompt: &str) -> AnalystResult<String> {
        let request = self.request(schema, prompt);
        let raw = self.generator.generate(&request).await?;
        debug!(stage = "generated", chars = raw.len(), "Generator answered");

        let query = sanitize(&raw);
        debug!(stage = "sanitized", %query);

        self.validator.validate(query)?;
        debug!(stage = "validated", %query);
        Ok(query.to_string())
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("validator", &self.validator)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}
