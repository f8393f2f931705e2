// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Scripted text generator for pipeline tests

use data_analyst::{AnalystError, AnalystResult, GenerationRequest, TextGenerator};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Generator answering from a queue of canned responses
///
/// When the queue runs dry the last response is repeated. Every request is
/// recorded for inspection.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that always answers `response`
    pub fn answering(response: impl Into<String>) -> Self {
        Self::new().then_answer(response)
    }

    /// Queue a successful response
    pub fn then_answer(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    /// Queue a generation failure
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, response: Result<String, String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    fn next_response(&self) -> Option<Result<String, String>> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(response) = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            *last = Some(response);
        }
        last.clone()
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> AnalystResult<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        match self.next_response() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AnalystError::Generation(message)),
            None => Err(AnalystError::Generation("no scripted response".to_string())),
        }
    }
}
