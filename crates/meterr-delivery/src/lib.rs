// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of queued usage records to the remote collector.
//!
//! [`HttpCollector`] speaks the collector's batch protocol; the
//! [`DeliveryEngine`] drains the durable queue on a schedule, acks what the
//! collector confirms and retries the rest with capped exponential backoff.

pub mod backoff;
pub mod engine;
pub mod http;

pub use backoff::Backoff;
pub use engine::{
    CycleOutcome, DeliveryEngine, DeliverySettings, EngineHandle, EngineState, FlushReport,
};
pub use http::HttpCollector;
