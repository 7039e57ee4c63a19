// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted collector for deterministic delivery tests.
//!
//! Replies are popped from a FIFO script; once it is empty the fallback
//! reply is used, which accepts every batch unless changed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use meterr_core::{BatchReceipt, Collector, MeterrError, Rejection, UsageRecord};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Accept every record in the batch.
    AcceptAll,
    /// Accept only these request ids; the rest are left unmentioned.
    Accept(Vec<String>),
    /// Reject these request ids with a reason; accept the rest.
    Reject(Vec<(String, String)>),
    /// Whole-batch failure with an HTTP-like status.
    Fail(u16),
    /// Transport failure.
    Unreachable,
}

/// A [`Collector`] that follows a script and remembers what it was sent.
#[derive(Clone)]
pub struct MockCollector {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: MockReply,
    batches: Arc<Mutex<Vec<Vec<UsageRecord>>>>,
    latency: Option<Duration>,
}

impl Default for MockCollector {
    fn default() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockReply::AcceptAll,
            batches: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that is never reachable.
    pub fn unreachable() -> Self {
        Self::default().with_fallback(MockReply::Unreachable)
    }

    /// Reply used once the script is exhausted.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_script(replies: Vec<MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(replies))),
            ..Self::default()
        }
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Every batch received, in order, including failed ones.
    pub async fn batches(&self) -> Vec<Vec<UsageRecord>> {
        self.batches.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.batches.lock().await.len()
    }

    /// Request ids of every record ever sent.
    pub async fn sent_ids(&self) -> Vec<String> {
        self.batches
            .lock()
            .await
            .iter()
            .flatten()
            .map(|r| r.request_id.clone())
            .collect()
    }
}

#[async_trait]
impl Collector for MockCollector {
    fn name(&self) -> &str {
        "mock-collector"
    }

    async fn send_batch(&self, records: &[UsageRecord]) -> Result<BatchReceipt, MeterrError> {
        self.batches.lock().await.push(records.to_vec());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::AcceptAll => Ok(BatchReceipt::accept_all(records)),
            MockReply::Accept(ids) => Ok(BatchReceipt {
                accepted: ids,
                rejected: Vec::new(),
            }),
            MockReply::Reject(rejections) => {
                let rejected: Vec<Rejection> = rejections
                    .into_iter()
                    .map(|(request_id, reason)| Rejection { request_id, reason })
                    .collect();
                let accepted = records
                    .iter()
                    .filter(|r| !rejected.iter().any(|x| x.request_id == r.request_id))
                    .map(|r| r.request_id.clone())
                    .collect();
                Ok(BatchReceipt { accepted, rejected })
            }
            MockReply::Fail(status) => Err(MeterrError::Collector {
                status,
                message: "scripted failure".into(),
            }),
            MockReply::Unreachable => Err(MeterrError::Delivery {
                message: "connection refused".into(),
                source: None,
            }),
        }
    }
}
