// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Text generation
//!
//! [`TextGenerator`] is the boundary to the language model. The pipeline
//! hands it a grounding instruction plus the user's request and gets free
//! text back. [`OpenAiGenerator`] talks to any OpenAI-compatible
//! chat-completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{AnalystError, AnalystResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instruction with the schema and rules
    pub instructions: String,
    /// User's natural-language request
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Text-generation service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce a response for `request`
    ///
    /// # Errors
    ///
    /// Returns `AnalystError::Generation` when the service fails or answers
    /// without text.
    async fn generate(&self, request: &GenerationRequest) -> AnalystResult<String>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions API
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> AnalystResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AnalystError::Generation(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: completions_url(&config.api_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AnalystResult<String> {
        debug!(model = %self.model, endpoint = %self.endpoint, "Requesting completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&chat_request(&self.model, request))
            .send()
            .await
            .map_err(|e| AnalystError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalystError::Generation(format!("HTTP {status}: {body}")));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalystError::Generation(format!("invalid response body: {e}")))?;
        first_choice(reply)
    }
}

fn completions_url(api_url: &str) -> String {
    format!("{}/chat/completions", api_url.trim_end_matches('/'))
}

fn chat_request<'a>(model: &'a str, request: &GenerationRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: request.instructions.clone(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            },
        ],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn first_choice(reply: ChatResponse) -> AnalystResult<String> {
    reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AnalystError::Generation("response contained no text".to_string()))
}
