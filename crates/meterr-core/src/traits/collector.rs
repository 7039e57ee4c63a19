// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote collector trait for shipping usage records.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MeterrError;
use crate::types::UsageRecord;

/// A destination that accepts batches of usage records.
///
/// Implementations must treat a batch as one request. An `Err` means the
/// whole batch failed; an `Ok` receipt lists which records were accepted.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Sends `records` as a single batch.
    async fn send_batch(&self, records: &[UsageRecord]) -> Result<BatchReceipt, MeterrError>;
}

/// A record the collector refused, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub request_id: String,
    #[serde(default)]
    pub reason: String,
}

/// Per-record acceptance result for one batch.
///
/// Records listed in neither `accepted` nor `rejected` count as failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    #[serde(default)]
    pub accepted: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<Rejection>,
}

impl BatchReceipt {
    /// A receipt accepting every record in the batch.
    pub fn accept_all(records: &[UsageRecord]) -> Self {
        Self {
            accepted: records.iter().map(|r| r.request_id.clone()).collect(),
            rejected: Vec::new(),
        }
    }

    /// Set of accepted request ids for lookup.
    pub fn accepted_set(&self) -> HashSet<&str> {
        self.accepted.iter().map(String::as_str).collect()
    }

    /// Reason given for rejecting `request_id`, if it was rejected.
    pub fn rejection_reason(&self, request_id: &str) -> Option<&str> {
        self.rejected
            .iter()
            .find(|r| r.request_id == request_id)
            .map(|r| r.reason.as_str())
    }

    /// True when the receipt carries no per-record information.
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_parses_with_missing_fields() {
        let receipt: BatchReceipt = serde_json::from_str("{}").unwrap();
        assert!(receipt.is_empty());

        let receipt: BatchReceipt = serde_json::from_value(serde_json::json!({
            "accepted": ["a", "b"],
            "rejected": [{"request_id": "c", "reason": "schema"}]
        }))
        .unwrap();
        assert!(receipt.accepted_set().contains("a"));
        assert_eq!(receipt.rejection_reason("c"), Some("schema"));
        assert_eq!(receipt.rejection_reason("a"), None);
    }
}
