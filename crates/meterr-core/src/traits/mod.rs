// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams between Meterr crates.
//!
//! Async traits use `#[async_trait]` so implementations can be held as
//! `Arc<dyn Trait>` by the facade and the delivery engine.

pub mod client;
pub mod collector;

pub use client::{ApiClient, ApiRequest, ApiResponse, TokenUsage};
pub use collector::{BatchReceipt, Collector, Rejection};
