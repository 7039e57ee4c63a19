// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost calculation from token counts.

use serde::Serialize;
use tracing::warn;

use crate::pricing::{PriceMatch, PricingEntry, PricingTable};

/// Cost of one call and how its price was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    /// Total cost in USD. Not rounded.
    pub cost_usd: f64,
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    /// False when the model was missing from the pricing table.
    pub known_model: bool,
}

/// Cost in USD of `input_tokens` and `output_tokens` at `entry`'s rates.
pub fn calculate_cost(entry: &PricingEntry, input_tokens: u32, output_tokens: u32) -> f64 {
    let (input, output) = split_cost(entry, input_tokens, output_tokens);
    input + output
}

fn split_cost(entry: &PricingEntry, input_tokens: u32, output_tokens: u32) -> (f64, f64) {
    (
        f64::from(input_tokens) / 1000.0 * entry.input_per_1k,
        f64::from(output_tokens) / 1000.0 * entry.output_per_1k,
    )
}

/// Prices calls against a [`PricingTable`].
#[derive(Debug, Clone, Default)]
pub struct CostCalculator {
    table: PricingTable,
}

impl CostCalculator {
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PricingTable {
        &self.table
    }

    /// Compute the cost of a call. Never fails.
    ///
    /// A model missing from the table is priced with the unknown-model entry
    /// and reported with a warning.
    pub fn cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> CostEstimate {
        let lookup = self.table.lookup(model);
        if lookup.matched == PriceMatch::Unknown {
            warn!(
                model,
                input_tokens, output_tokens, "no pricing entry for model, using default pricing"
            );
        }
        let (input_cost_usd, output_cost_usd) =
            split_cost(&lookup.entry, input_tokens, output_tokens);
        CostEstimate {
            cost_usd: input_cost_usd + output_cost_usd,
            input_cost_usd,
            output_cost_usd,
            known_model: lookup.is_known(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    #[test]
    fn gpt4_scenario() {
        let estimate = CostCalculator::default().cost("gpt-4", 1000, 500);
        assert!((estimate.cost_usd - 0.06).abs() < 1e-12);
        assert!((estimate.input_cost_usd - 0.03).abs() < 1e-12);
        assert!((estimate.output_cost_usd - 0.03).abs() < 1e-12);
        assert!(estimate.known_model);
    }

    #[test]
    fn zero_tokens_cost_nothing() {
        assert_eq!(CostCalculator::default().cost("gpt-4o", 0, 0).cost_usd, 0.0);
    }

    #[test]
    fn small_costs_are_not_rounded() {
        let estimate = CostCalculator::default().cost("text-embedding-3-small", 1, 0);
        assert!(estimate.cost_usd > 0.0);
        assert!((estimate.cost_usd - 0.00000002).abs() < 1e-18);
    }

    #[test]
    #[traced_test]
    fn unknown_model_warns_instead_of_failing() {
        let estimate = CostCalculator::default().cost("unknown-model-x", 1000, 1000);
        assert!(!estimate.known_model);
        assert_eq!(estimate.cost_usd, 0.0);
        assert!(logs_contain("no pricing entry for model"));
    }

    #[test]
    #[traced_test]
    fn dated_model_is_priced_without_warning() {
        let estimate = CostCalculator::default().cost("gpt-4-0613", 1000, 0);
        assert!(estimate.known_model);
        assert!((estimate.cost_usd - 0.03).abs() < 1e-12);
        assert!(!logs_contain("no pricing entry for model"));
    }

    proptest! {
        #[test]
        fn cost_is_monotonic_in_both_counts(
            model in "(gpt-4|gpt-4o-mini|gpt-3.5-turbo|text-embedding-3-large|unknown-model-x)",
            input in 0u32..1_000_000,
            output in 0u32..1_000_000,
            extra in 0u32..10_000,
        ) {
            let calc = CostCalculator::default();
            let base = calc.cost(&model, input, output).cost_usd;
            prop_assert!(base >= 0.0);
            prop_assert!(calc.cost(&model, input + extra, output).cost_usd >= base);
            prop_assert!(calc.cost(&model, input, output + extra).cost_usd >= base);
        }
    }
}
