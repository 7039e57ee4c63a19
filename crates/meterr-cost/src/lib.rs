// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token estimation, pricing, and usage record construction.
//!
//! Everything here is pure computation: estimation and pricing never fail,
//! falling back to a character ratio or the unknown-model price instead.

pub mod calculator;
pub mod pricing;
pub mod record;
pub mod tokens;

pub use calculator::{CostCalculator, CostEstimate, calculate_cost};
pub use pricing::{PriceLookup, PriceMatch, PricingEntry, PricingTable};
pub use record::{CompletedCall, Labels, UsageRecordFactory};
pub use tokens::{CharRatioEncoder, TiktokenEncoder, TokenEncoder, TokenEstimator};
