// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability interface a caller's API client must expose to be tracked.
//!
//! Callers adapt their own client (OpenAI, Anthropic, an internal gateway)
//! to [`ApiClient`]; the tracker wraps it and never inspects anything beyond
//! what these traits return.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::Content;

/// Token counts reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// What the tracker needs to know about an outgoing call.
pub trait ApiRequest: Send {
    /// Model identifier the call targets.
    fn model(&self) -> &str;

    /// Logical operation name, e.g. "chat.completions".
    fn endpoint(&self) -> &str;

    /// The prompt, used to estimate input tokens when the provider does not
    /// report usage.
    fn content(&self) -> Content;

    /// Caller-chosen idempotency key. A UUID is generated when `None`.
    fn request_id(&self) -> Option<String> {
        None
    }
}

/// What the tracker reads back from a completed call.
pub trait ApiResponse: Send {
    /// Provider-reported usage, when available.
    fn usage(&self) -> Option<TokenUsage>;

    /// Generated text, used to estimate output tokens when `usage` is absent.
    fn output_text(&self) -> Option<String> {
        None
    }
}

/// A client whose calls can be observed.
#[async_trait]
pub trait ApiClient: Send + Sync {
    type Request: ApiRequest + 'static;
    type Response: ApiResponse + 'static;
    type Error: fmt::Display + Send + 'static;

    /// Issue the call.
    async fn call(&self, request: Self::Request) -> Result<Self::Response, Self::Error>;
}
