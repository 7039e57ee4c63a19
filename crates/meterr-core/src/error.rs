// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Meterr telemetry pipeline.

use thiserror::Error;

/// The primary error type used across Meterr crates.
///
/// Telemetry errors never reach callers of the tracking facade; they surface
/// here for the storage, delivery, and CLI layers that need to act on them.
#[derive(Debug, Error)]
pub enum MeterrError {
    /// Configuration errors (invalid endpoint, missing credential, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable queue errors (database open, query failure, disk full).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A usage record could not be encoded or decoded.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Transport-level delivery failure (connection refused, DNS, TLS).
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The collector answered with a non-success status.
    #[error("collector returned {status}: {message}")]
    Collector { status: u16, message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MeterrError {
    /// Returns true when retrying the same operation later may succeed.
    ///
    /// Storage and serialization errors are local faults; everything on the
    /// network side is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MeterrError::Delivery { .. } | MeterrError::Collector { .. } | MeterrError::Timeout { .. }
        )
    }
}
