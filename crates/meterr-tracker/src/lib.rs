// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage tracking for LLM API clients.
//!
//! Build a [`Meterr`] context from configuration, wrap a client with
//! [`Meterr::track`], and every call through the wrapper is costed,
//! queued durably and delivered to the collector in the background.
//!
//! ```no_run
//! # async fn demo(client: impl meterr_core::ApiClient) -> Result<(), meterr_core::MeterrError> {
//! let config = meterr_config::MeterrConfig::default();
//! let meterr = meterr_tracker::Meterr::builder(config).build().await?;
//! let tracked = meterr.track(client);
//! // ... use `tracked` exactly like the wrapped client ...
//! meterr.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod facade;
pub mod tracked;

pub use facade::{Meterr, MeterrBuilder, RecordOutcome};
pub use tracked::Tracked;
