// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote usage collector.
//!
//! A batch is one `POST` of `{"records": [...]}`. A 2xx reply may list
//! accepted and rejected request ids; an empty or field-less 2xx body
//! accepts the whole batch. Anything else fails the whole batch.

use std::time::Duration;

use async_trait::async_trait;
use meterr_config::model::CollectorConfig;
use meterr_core::{BatchReceipt, Collector, MeterrError, Rejection, UsageRecord};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct BatchRequest<'a> {
    records: &'a [UsageRecord],
}

#[derive(Deserialize)]
struct ReceiptBody {
    accepted: Option<Vec<String>>,
    rejected: Option<Vec<Rejection>>,
}

/// [`Collector`] that ships batches over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpCollector {
    /// Build a client for `endpoint`, authenticating with `api_key` as a
    /// bearer token when one is given.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, MeterrError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        match &api_key {
            Some(key) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                    .map_err(|e| MeterrError::Config(format!("invalid API key header value: {e}")))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => warn!("no collector API key configured, sending unauthenticated"),
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("meterr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| MeterrError::Delivery {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    /// Build from the `[collector]` config section.
    pub fn from_config(config: &CollectorConfig) -> Result<Self, MeterrError> {
        let api_key = config.api_key.clone().map(SecretString::from);
        Self::new(config.endpoint.clone(), api_key, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> MeterrError {
        if e.is_timeout() {
            MeterrError::Timeout {
                duration: self.timeout,
            }
        } else {
            MeterrError::Delivery {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            }
        }
    }
}

#[async_trait]
impl Collector for HttpCollector {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_batch(&self, records: &[UsageRecord]) -> Result<BatchReceipt, MeterrError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&BatchRequest { records })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        debug!(status = %status, records = records.len(), "collector response received");

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(MeterrError::Collector {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        parse_receipt(status.as_u16(), &body, records)
    }
}

/// Interpret a 2xx body.
///
/// An empty body or a JSON object without receipt fields confirms the whole
/// batch. Anything that is not JSON confirms nothing.
fn parse_receipt(
    status: u16,
    body: &str,
    records: &[UsageRecord],
) -> Result<BatchReceipt, MeterrError> {
    if body.trim().is_empty() {
        return Ok(BatchReceipt::accept_all(records));
    }
    match serde_json::from_str::<ReceiptBody>(body) {
        Ok(ReceiptBody {
            accepted: None,
            rejected: None,
        }) => Ok(BatchReceipt::accept_all(records)),
        Ok(ReceiptBody { accepted, rejected }) => Ok(BatchReceipt {
            accepted: accepted.unwrap_or_default(),
            rejected: rejected.unwrap_or_default(),
        }),
        Err(e) => {
            warn!(status, error = %e, "unreadable 2xx collector body, treating batch as failed");
            Err(MeterrError::Collector {
                status,
                message: format!("unreadable receipt: {}", truncate(body)),
            })
        }
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
