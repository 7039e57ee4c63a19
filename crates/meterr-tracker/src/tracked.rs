// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metering decorator for [`ApiClient`] implementations.

use std::time::Instant;

use async_trait::async_trait;
use meterr_core::{ApiClient, ApiRequest, ApiResponse};
use meterr_cost::{CompletedCall, Labels};

use crate::facade::Meterr;

/// A client whose every call produces a usage record.
///
/// Results and errors pass through unchanged. Recording happens on a
/// background task owned by the [`Meterr`] context.
pub struct Tracked<C> {
    inner: C,
    meterr: Meterr,
    labels: Labels,
}

impl<C> Tracked<C> {
    pub(crate) fn new(inner: C, meterr: Meterr) -> Self {
        Self {
            inner,
            meterr,
            labels: Labels::default(),
        }
    }

    /// Labels for calls through this wrapper, layered over the configured
    /// defaults.
    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

#[async_trait]
impl<C> ApiClient for Tracked<C>
where
    C: ApiClient,
{
    type Request = C::Request;
    type Response = C::Response;
    type Error = C::Error;

    async fn call(&self, request: Self::Request) -> Result<Self::Response, Self::Error> {
        let model = request.model().to_string();
        let endpoint = request.endpoint().to_string();
        let request_id = request.request_id();
        let prompt = request.content();

        let started = Instant::now();
        let result = self.inner.call(request).await;
        let latency = started.elapsed();

        let estimator = self.meterr.estimator();
        let mut call = CompletedCall::new(&model, endpoint)
            .latency(latency)
            .labels(self.labels.clone());
        if let Some(id) = request_id {
            call = call.request_id(id);
        }

        call = match &result {
            Ok(response) => match response.usage() {
                Some(usage) => call.tokens(usage.input_tokens, usage.output_tokens),
                None => {
                    let input = estimator.estimate(&prompt, &model);
                    let output = response
                        .output_text()
                        .map(|text| estimator.count_text(&text, &model))
                        .unwrap_or(0);
                    call.tokens(input, output)
                }
            },
            Err(e) => call
                .tokens(estimator.estimate(&prompt, &model), 0)
                .failed(e.to_string()),
        };

        self.meterr.observe(call);
        result
    }
}
