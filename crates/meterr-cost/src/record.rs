// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage record construction.

use std::sync::Arc;
use std::time::Duration;

use meterr_config::model::TrackingConfig;
use meterr_core::{CallStatus, Tags, UsageRecord, now_millis};

use crate::calculator::CostCalculator;

/// Attribution labels attached to a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Labels {
    pub team: Option<String>,
    pub project: Option<String>,
    pub tags: Tags,
}

impl Labels {
    /// `self` layered over `defaults`: set fields win, tags merge key by key.
    pub fn merged_over(&self, defaults: &Labels) -> Labels {
        let mut tags = defaults.tags.clone();
        tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Labels {
            team: self.team.clone().or_else(|| defaults.team.clone()),
            project: self.project.clone().or_else(|| defaults.project.clone()),
            tags,
        }
    }
}

impl From<&TrackingConfig> for Labels {
    fn from(config: &TrackingConfig) -> Self {
        Self {
            team: config.team.clone(),
            project: config.project.clone(),
            tags: config.tags.clone(),
        }
    }
}

/// Everything known about a call once it has completed.
#[derive(Debug, Clone)]
pub struct CompletedCall {
    pub model: String,
    pub endpoint: String,
    /// Caller-supplied idempotency key; generated when absent.
    pub request_id: Option<String>,
    pub latency: Duration,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Failure description when the call did not succeed.
    pub error: Option<String>,
    /// Per-call labels, layered over the factory defaults.
    pub labels: Labels,
}

impl CompletedCall {
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            endpoint: endpoint.into(),
            request_id: None,
            latency: Duration::ZERO,
            input_tokens: 0,
            output_tokens: 0,
            error: None,
            labels: Labels::default(),
        }
    }

    pub fn tokens(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }
}

/// Builds [`UsageRecord`]s from completed calls.
///
/// A failed call keeps the estimated prompt size in `input_tokens` but is
/// recorded with zero billed tokens and zero cost.
#[derive(Debug, Clone)]
pub struct UsageRecordFactory {
    calculator: Arc<CostCalculator>,
    defaults: Labels,
}

impl UsageRecordFactory {
    pub fn new(calculator: Arc<CostCalculator>, defaults: Labels) -> Self {
        Self {
            calculator,
            defaults,
        }
    }

    pub fn calculator(&self) -> &CostCalculator {
        &self.calculator
    }

    pub fn defaults(&self) -> &Labels {
        &self.defaults
    }

    pub fn build(&self, call: CompletedCall) -> UsageRecord {
        let labels = call.labels.merged_over(&self.defaults);
        let (status, total_tokens, cost) = match call.error {
            None => {
                let cost = self
                    .calculator
                    .cost(&call.model, call.input_tokens, call.output_tokens);
                (
                    CallStatus::Ok,
                    call.input_tokens.saturating_add(call.output_tokens),
                    cost.cost_usd,
                )
            }
            Some(_) => (CallStatus::Error, 0, 0.0),
        };

        UsageRecord {
            timestamp: now_millis(),
            model: call.model,
            input_tokens: call.input_tokens,
            output_tokens: call.output_tokens,
            total_tokens,
            cost,
            team: labels.team,
            project: labels.project,
            tags: labels.tags,
            request_id: call
                .request_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            endpoint: call.endpoint,
            latency_ms: call.latency.as_secs_f64() * 1000.0,
            status,
            error: call.error,
        }
    }
}
