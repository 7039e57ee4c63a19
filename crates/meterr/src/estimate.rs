// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `meterr estimate` and `meterr cost` command implementations.

use std::path::Path;

use meterr_config::model::MeterrConfig;
use meterr_core::{Content, MeterrError};
use meterr_cost::{CostCalculator, CostEstimate, PricingTable, TokenEstimator};

/// Run the `meterr estimate` command.
pub fn run_estimate(model: &str, file: Option<&Path>, text: Option<&str>) -> Result<(), MeterrError> {
    let text = match (file, text) {
        (Some(path), _) => std::fs::read_to_string(path).map_err(|e| {
            MeterrError::Internal(format!("failed to read {}: {e}", path.display()))
        })?,
        (None, Some(text)) => text.to_string(),
        (None, None) => String::new(),
    };

    let estimator = TokenEstimator::new();
    let tokens = estimator.estimate(&Content::Text(text), model);
    let encoder = estimator.encoder_for(model);
    println!("{tokens} tokens ({model}, {})", encoder.name());
    Ok(())
}

/// Run the `meterr cost` command.
pub fn run_cost(config: &MeterrConfig, model: &str, input: u32, output: u32) {
    let estimate = cost_for(config, model, input, output);
    println!("  {model}: {input} input + {output} output tokens");
    println!("    Input:   ${:.6}", estimate.input_cost_usd);
    println!("    Output:  ${:.6}", estimate.output_cost_usd);
    println!("    Total:   ${}", estimate.cost_usd);
    if !estimate.known_model {
        println!("    (no pricing entry for {model}; priced at the default rate)");
    }
}

fn cost_for(config: &MeterrConfig, model: &str, input: u32, output: u32) -> CostEstimate {
    let table = PricingTable::builtin().with_overrides(&config.pricing);
    CostCalculator::new(table).cost(model, input, output)
}
