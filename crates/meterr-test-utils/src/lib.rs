// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Meterr integration tests.
//!
//! # Components
//!
//! - [`MockCollector`] - scripted collector that records every batch it receives
//! - [`MockClient`] - scripted API client for exercising the tracker
//! - [`fixtures`] - ready-made usage records

pub mod fixtures;
pub mod mock_client;
pub mod mock_collector;

pub use fixtures::{sample_record, sample_records};
pub use mock_client::{MockClient, MockError, MockRequest, MockResponse};
pub use mock_collector::{MockCollector, MockReply};
