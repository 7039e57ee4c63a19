// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted API client for tracker tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use meterr_core::{ApiClient, ApiRequest, ApiResponse, Content, TokenUsage};

/// A request carrying a model, an endpoint name and a prompt.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub model: String,
    pub endpoint: String,
    pub prompt: Content,
    pub request_id: Option<String>,
}

impl MockRequest {
    pub fn chat(model: impl Into<String>, prompt: impl Into<Content>) -> Self {
        Self {
            model: model.into(),
            endpoint: "chat.completions".into(),
            prompt: prompt.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl ApiRequest for MockRequest {
    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn content(&self) -> Content {
        self.prompt.clone()
    }

    fn request_id(&self) -> Option<String> {
        self.request_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

impl MockResponse {
    /// A response that reports its own token usage.
    pub fn with_usage(text: impl Into<String>, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            text: text.into(),
            usage: Some(TokenUsage {
                input_tokens,
                output_tokens,
            }),
        }
    }

    /// A response without usage metadata.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

impl ApiResponse for MockResponse {
    fn usage(&self) -> Option<TokenUsage> {
        self.usage
    }

    fn output_text(&self) -> Option<String> {
        Some(self.text.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockError(pub String);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}

/// An [`ApiClient`] returning scripted results in order.
///
/// When the script runs out, calls succeed with 10 input and 20 output
/// tokens.
#[derive(Clone, Default)]
pub struct MockClient {
    script: Arc<Mutex<VecDeque<Result<MockResponse, MockError>>>>,
    calls: Arc<Mutex<Vec<MockRequest>>>,
    latency: Option<Duration>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Result<MockResponse, MockError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(script))),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Requests received so far.
    pub async fn calls(&self) -> Vec<MockRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ApiClient for MockClient {
    type Request = MockRequest;
    type Response = MockResponse;
    type Error = MockError;

    async fn call(&self, request: MockRequest) -> Result<MockResponse, MockError> {
        self.calls.lock().await.push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(MockResponse::with_usage("mock response", 10, 20)))
    }
}
