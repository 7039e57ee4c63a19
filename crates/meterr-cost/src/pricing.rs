// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing table.
//!
//! Prices are USD per 1,000 tokens, taken from the OpenAI price sheet the
//! Python SDK shipped with:
//!
//! GPT-4:            input=$0.03/1K,    output=$0.06/1K
//! GPT-4o:           input=$0.005/1K,   output=$0.015/1K
//! GPT-4o mini:      input=$0.00015/1K, output=$0.0006/1K
//! GPT-3.5 Turbo:    input=$0.0005/1K,  output=$0.0015/1K
//! Embeddings carry no output price.

use std::collections::{BTreeMap, HashMap};

use meterr_config::model::PricingOverride;
use serde::Serialize;

/// Input and output price for one model, USD per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingEntry {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl PricingEntry {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

impl From<PricingOverride> for PricingEntry {
    fn from(value: PricingOverride) -> Self {
        Self::new(value.input_per_1k, value.output_per_1k)
    }
}

/// Entry used for models missing from the table.
///
/// Zero-priced so unknown models are never over-billed; every lookup that
/// lands here is reported as [`PriceMatch::Unknown`] so callers can warn.
pub const UNKNOWN_MODEL_PRICING: PricingEntry = PricingEntry::new(0.0, 0.0);

const BUILTIN_PRICES: &[(&str, PricingEntry)] = &[
    // GPT-4 family
    ("gpt-4", PricingEntry::new(0.03, 0.06)),
    ("gpt-4-32k", PricingEntry::new(0.06, 0.12)),
    ("gpt-4-turbo-preview", PricingEntry::new(0.01, 0.03)),
    ("gpt-4-1106-preview", PricingEntry::new(0.01, 0.03)),
    ("gpt-4-vision-preview", PricingEntry::new(0.01, 0.03)),
    ("gpt-4o", PricingEntry::new(0.005, 0.015)),
    ("gpt-4o-mini", PricingEntry::new(0.00015, 0.0006)),
    // GPT-3.5 family
    ("gpt-3.5-turbo", PricingEntry::new(0.0005, 0.0015)),
    ("gpt-3.5-turbo-16k", PricingEntry::new(0.003, 0.004)),
    ("gpt-3.5-turbo-1106", PricingEntry::new(0.001, 0.002)),
    ("gpt-3.5-turbo-0125", PricingEntry::new(0.0005, 0.0015)),
    // Legacy completions
    ("text-davinci-003", PricingEntry::new(0.02, 0.02)),
    ("text-davinci-002", PricingEntry::new(0.02, 0.02)),
    ("text-curie-001", PricingEntry::new(0.002, 0.002)),
    ("text-babbage-001", PricingEntry::new(0.0005, 0.0005)),
    ("text-ada-001", PricingEntry::new(0.0004, 0.0004)),
    // Embeddings
    ("text-embedding-ada-002", PricingEntry::new(0.0001, 0.0)),
    ("text-embedding-3-small", PricingEntry::new(0.00002, 0.0)),
    ("text-embedding-3-large", PricingEntry::new(0.00013, 0.0)),
];

/// How a model identifier was resolved against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceMatch {
    /// The identifier is in the table as-is.
    Exact,
    /// A dated or suffixed variant of a known model, e.g. `gpt-4-0613`.
    Prefix(String),
    /// Not in the table; the unknown-model entry was used.
    Unknown,
}

/// Result of a pricing lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLookup {
    pub entry: PricingEntry,
    pub matched: PriceMatch,
}

impl PriceLookup {
    pub fn is_known(&self) -> bool {
        self.matched != PriceMatch::Unknown
    }
}

/// Immutable mapping from model identifier to price.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingTable {
    /// The built-in price sheet.
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_PRICES
                .iter()
                .map(|(model, entry)| (model.to_string(), *entry))
                .collect(),
        }
    }

    /// An empty table; every lookup resolves to the unknown-model entry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Merge configured overrides over this table.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, PricingOverride>) -> Self {
        for (model, price) in overrides {
            self.entries
                .insert(model.to_lowercase(), PricingEntry::from(*price));
        }
        self
    }

    /// Add or replace a single entry.
    pub fn with_entry(mut self, model: &str, entry: PricingEntry) -> Self {
        self.entries.insert(model.to_lowercase(), entry);
        self
    }

    /// Resolve `model` to a price.
    ///
    /// Tries an exact (case-insensitive) match first, then the longest
    /// known model that `model` extends with a `-` suffix. Never fails.
    pub fn lookup(&self, model: &str) -> PriceLookup {
        let model = model.trim().to_lowercase();

        if let Some(entry) = self.entries.get(&model) {
            return PriceLookup {
                entry: *entry,
                matched: PriceMatch::Exact,
            };
        }

        let best = self
            .entries
            .iter()
            .filter(|(known, _)| {
                model
                    .strip_prefix(known.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
            })
            .max_by_key(|(known, _)| known.len());

        match best {
            Some((known, entry)) => PriceLookup {
                entry: *entry,
                matched: PriceMatch::Prefix(known.clone()),
            },
            None => PriceLookup {
                entry: UNKNOWN_MODEL_PRICING,
                matched: PriceMatch::Unknown,
            },
        }
    }

    /// Exact-match entry for `model`, if present.
    pub fn get(&self, model: &str) -> Option<&PricingEntry> {
        self.entries.get(&model.to_lowercase())
    }

    /// All entries sorted by model name.
    pub fn entries(&self) -> Vec<(&str, &PricingEntry)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|(model, entry)| (model.as_str(), entry))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
