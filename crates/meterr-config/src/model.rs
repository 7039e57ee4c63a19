// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Meterr telemetry pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use std::collections::BTreeMap;
use std::time::Duration;

use meterr_core::Tags;
use serde::{Deserialize, Serialize};

/// Top-level Meterr configuration.
///
/// Every section is optional and defaults to values suitable for a single
/// process shipping to the hosted collector.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MeterrConfig {
    /// Remote collector endpoint and credential.
    #[serde(default)]
    pub collector: CollectorConfig,

    /// On-disk durable queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Batching, flush cadence, and retry policy.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Labels applied to every record.
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Per-model price overrides merged over the built-in table.
    #[serde(default)]
    pub pricing: BTreeMap<String, PricingOverride>,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote collector configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// URL that receives `POST` batches of usage records.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Collector API key. `None` falls back to the `METERR_API_KEY` variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CollectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_endpoint() -> String {
    "https://api.meterr.ai/v1/usage".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Durable queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Path to the SQLite queue file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journaling.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("meterr").join("queue.db"))
        .unwrap_or_else(|| std::path::PathBuf::from(".meterr_queue.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Delivery engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Maximum records per collector request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between scheduled drain cycles.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Failed attempts allowed before a record is dead-lettered.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles per retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on the backoff delay in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Try to deliver each record as soon as it is produced, queueing only
    /// on failure. When false every record goes through the queue.
    #[serde(default = "default_immediate_send")]
    pub immediate_send: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            immediate_send: default_immediate_send(),
        }
    }
}

impl DeliveryConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_immediate_send() -> bool {
    true
}

/// Default labels stamped on every usage record.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    #[serde(default)]
    pub team: Option<String>,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub tags: Tags,
}

/// Price override for one model, in USD per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingOverride {
    pub input_per_1k: f64,
    #[serde(default)]
    pub output_per_1k: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for Meterr targets (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
