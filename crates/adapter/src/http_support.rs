// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! HTTP plumbing shared by the engines reached over REST

use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::engine::EngineKind;
use crate::error::{AdapterError, AdapterResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One engine endpoint with optional basic credentials
pub(crate) struct HttpEndpoint {
    engine: EngineKind,
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    closed: AtomicBool,
}

impl HttpEndpoint {
    pub(crate) fn new(config: &ConnectionConfig) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdapterError::Connection(format!("Failed to build HTTP client: {e}")))?;

        let credentials = (!config.user.is_empty() && !config.password.is_empty())
            .then(|| (config.user.clone(), config.password.clone()));

        Ok(Self {
            engine: config.engine,
            client,
            base_url: config.base_url(),
            credentials,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request to `path`, failing once the endpoint is closed
    pub(crate) fn request(&self, method: Method, path: &str) -> AdapterResult<RequestBuilder> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AdapterError::closed(self.engine));
        }
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        Ok(match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        })
    }

    /// Mark the endpoint closed; returns whether it was open
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Send a request and decode a JSON body
///
/// Non-success statuses become an error carrying the response body.
pub(crate) async fn send_json(builder: RequestBuilder) -> Result<JsonValue, String> {
    let response = builder.send().await.map_err(|e| e.to_string())?;
    decode_json(response).await
}

async fn decode_json(response: Response) -> Result<JsonValue, String> {
    let status = response.status();
    let body = response.text().await.map_err(|e| e.to_string())?;
    if !status.is_success() {
        return Err(format!("HTTP {status}: {}", body.trim()));
    }
    serde_json::from_str(&body).map_err(|e| format!("invalid JSON response: {e}"))
}
