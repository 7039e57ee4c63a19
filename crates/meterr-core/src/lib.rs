// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Meterr usage-telemetry pipeline.
//!
//! Holds the types every other crate agrees on: the [`MeterrError`] type,
//! the [`UsageRecord`] wire model, the content model the token estimator
//! reads, the [`Collector`] trait the delivery layer sends through, and the
//! [`ApiClient`] interface a caller's client is adapted to for tracking.

pub mod content;
pub mod error;
pub mod traits;
pub mod types;

pub use content::{ChatMessage, Content, ContentPart, MessageContent};
pub use error::MeterrError;
pub use traits::{
    ApiClient, ApiRequest, ApiResponse, BatchReceipt, Collector, Rejection, TokenUsage,
};
pub use types::{CallStatus, TagValue, Tags, UsageRecord, now_millis};
