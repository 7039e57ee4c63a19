// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batching delivery engine.
//!
//! One background worker drains the durable queue in FIFO batches and
//! ships them to the collector. Each cycle moves through
//! `Idle -> Draining -> Sending -> Acking | Backoff -> Idle`.
//!
//! Entries leave the queue only after the collector confirms them, so an
//! abandoned cycle never loses records. Failed entries have their retry
//! count bumped and are dead-lettered once past the ceiling.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use meterr_config::model::DeliveryConfig;
use meterr_core::{Collector, MeterrError, UsageRecord};
use meterr_storage::{FailureOutcome, QueueEntry, UsageQueue};
use strum::Display;
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;

/// Reason stored for records the collector neither accepted nor rejected.
const UNACKNOWLEDGED: &str = "not acknowledged by collector";

/// Where the engine is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineState {
    Idle,
    Draining,
    Sending,
    Acking,
    Backoff,
    Stopped,
}

/// Tunables taken from the `[delivery]` config section.
#[derive(Debug, Clone, Copy)]
pub struct DeliverySettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl From<&DeliveryConfig> for DeliverySettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval(),
            max_retries: config.max_retries,
            backoff: Backoff::new(config.backoff_base(), config.backoff_cap()),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing was pending.
    Empty,
    /// The collector answered. Some records may still have been refused.
    Delivered {
        sent: usize,
        acked: usize,
        retried: usize,
        dead_lettered: usize,
    },
    /// The whole batch failed; wait `retry_after` before draining again.
    Failed {
        error: String,
        retried: usize,
        dead_lettered: usize,
        retry_after: Duration,
    },
}

/// Totals over a run of cycles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub cycles: usize,
    pub acked: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    /// Error of the cycle that stopped the flush, if any.
    pub last_error: Option<String>,
}

impl FlushReport {
    /// Records are still owed a retry, so the next drain waits out the
    /// backoff for the highest retry count.
    pub fn needs_backoff(&self) -> bool {
        self.last_error.is_some() || self.retried > 0
    }
}

/// Cheap handle for nudging a running engine and watching its state.
#[derive(Clone)]
pub struct EngineHandle {
    wake: Arc<Notify>,
    state: watch::Receiver<EngineState>,
}

impl EngineHandle {
    /// Ask the engine to drain now instead of waiting for the next tick.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }
}

pub struct DeliveryEngine {
    queue: UsageQueue,
    collector: Arc<dyn Collector>,
    settings: DeliverySettings,
    wake: Arc<Notify>,
    state: watch::Sender<EngineState>,
    /// Held for the duration of a cycle; cycles never overlap.
    cycle_lock: Mutex<()>,
}

impl DeliveryEngine {
    pub fn new(queue: UsageQueue, collector: Arc<dyn Collector>, settings: DeliverySettings) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self {
            queue,
            collector,
            settings,
            wake: Arc::new(Notify::new()),
            state,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            wake: Arc::clone(&self.wake),
            state: self.state.subscribe(),
        }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    pub fn queue(&self) -> &UsageQueue {
        &self.queue
    }

    fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    /// Run one drain/send/settle cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, MeterrError> {
        let _cycle = self.cycle_lock.lock().await;
        let result = self.cycle().await;
        self.set_state(EngineState::Idle);
        result
    }

    async fn cycle(&self) -> Result<CycleOutcome, MeterrError> {
        self.set_state(EngineState::Draining);
        let entries = self.queue.dequeue_batch(self.settings.batch_size).await?;
        if entries.is_empty() {
            return Ok(CycleOutcome::Empty);
        }

        let (batch, undecodable) = decode_entries(entries);
        let mut dead_lettered = 0;
        if !undecodable.is_empty() {
            warn!(count = undecodable.len(), "dead-lettering undecodable queue entries");
            dead_lettered += self.queue.dead_letter(&undecodable).await?;
        }
        if batch.is_empty() {
            return Ok(CycleOutcome::Delivered {
                sent: 0,
                acked: 0,
                retried: 0,
                dead_lettered,
            });
        }

        self.set_state(EngineState::Sending);
        let records: Vec<UsageRecord> = batch.iter().map(|(_, r)| r.clone()).collect();
        let sent = records.len();
        debug!(collector = self.collector.name(), records = sent, "sending batch");

        match self.collector.send_batch(&records).await {
            Ok(receipt) => {
                self.set_state(EngineState::Acking);
                let accepted = receipt.accepted_set();
                let mut acked_ids = Vec::new();
                let mut failed: BTreeMap<String, Vec<i64>> = BTreeMap::new();
                for (local_id, record) in &batch {
                    let rejected = receipt.rejection_reason(&record.request_id);
                    match rejected {
                        Some(reason) => failed
                            .entry(format!("rejected by collector: {reason}"))
                            .or_default()
                            .push(*local_id),
                        None if accepted.contains(record.request_id.as_str()) => {
                            acked_ids.push(*local_id)
                        }
                        None => failed.entry(UNACKNOWLEDGED.to_string()).or_default().push(*local_id),
                    }
                }

                let acked = self.queue.ack(&acked_ids).await?;
                let mut retried = 0;
                for (reason, ids) in failed {
                    let outcome = self
                        .queue
                        .record_failures(&ids, self.settings.max_retries, &reason)
                        .await?;
                    log_dead_letters(&outcome, &reason);
                    retried += outcome.retried.len();
                    dead_lettered += outcome.dead_lettered.len();
                }

                info!(sent, acked, retried, dead_lettered, "batch delivered");
                Ok(CycleOutcome::Delivered {
                    sent,
                    acked,
                    retried,
                    dead_lettered,
                })
            }
            Err(e) => {
                self.set_state(EngineState::Backoff);
                let reason = e.to_string();
                let ids: Vec<i64> = batch.iter().map(|(id, _)| *id).collect();
                let outcome = self
                    .queue
                    .record_failures(&ids, self.settings.max_retries, &reason)
                    .await?;
                log_dead_letters(&outcome, &reason);
                let retry_after = self.settings.backoff.delay(outcome.max_retry_count());
                warn!(
                    error = %e,
                    records = sent,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "batch delivery failed"
                );
                Ok(CycleOutcome::Failed {
                    error: reason,
                    retried: outcome.retried.len(),
                    dead_lettered: dead_lettered + outcome.dead_lettered.len(),
                    retry_after,
                })
            }
        }
    }

    /// Run cycles until the queue is empty, a cycle fails, or a cycle makes
    /// no progress.
    pub async fn flush(&self) -> Result<FlushReport, MeterrError> {
        let mut report = FlushReport::default();
        loop {
            let outcome = self.run_cycle().await?;
            report.cycles += 1;
            match outcome {
                CycleOutcome::Empty => break,
                CycleOutcome::Delivered {
                    sent,
                    acked,
                    retried,
                    dead_lettered,
                } => {
                    report.acked += acked;
                    report.retried += retried;
                    report.dead_lettered += dead_lettered;
                    // Refused records wait out their backoff before the next drain.
                    let progressed = acked + dead_lettered > 0;
                    let full = sent + dead_lettered >= self.settings.batch_size;
                    if !progressed || retried > 0 || !full {
                        break;
                    }
                }
                CycleOutcome::Failed {
                    error,
                    retried,
                    dead_lettered,
                    ..
                } => {
                    report.retried += retried;
                    report.dead_lettered += dead_lettered;
                    report.last_error = Some(error);
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Drain on every tick or wake-up until `cancel` fires.
    ///
    /// A cycle already in flight is allowed to finish; a backoff wait is cut
    /// short by cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.flush_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            batch_size = self.settings.batch_size,
            flush_interval_secs = self.settings.flush_interval.as_secs(),
            "delivery engine started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
                _ = self.wake.notified() => debug!("delivery engine woken"),
            }

            let pause = match self.flush().await {
                Ok(report) if report.needs_backoff() => self.current_backoff().await,
                Ok(_) => None,
                Err(e) => {
                    error!(error = %e, "delivery cycle aborted by storage error");
                    None
                }
            };

            if let Some(pause) = pause {
                self.set_state(EngineState::Backoff);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
                self.set_state(EngineState::Idle);
            }
        }

        self.set_state(EngineState::Stopped);
        info!("delivery engine stopped");
    }

    /// Backoff owed to the most-retried pending entry.
    async fn current_backoff(&self) -> Option<Duration> {
        match self.queue.stats().await {
            Ok(stats) => Some(self.settings.backoff.delay(stats.max_retry_count)),
            Err(e) => {
                error!(error = %e, "failed to read queue stats");
                Some(self.settings.backoff.base)
            }
        }
    }
}

fn decode_entries(entries: Vec<QueueEntry>) -> (Vec<(i64, UsageRecord)>, Vec<(i64, String)>) {
    let mut batch = Vec::with_capacity(entries.len());
    let mut undecodable = Vec::new();
    let mut seen = HashSet::new();
    for entry in entries {
        match entry.decode() {
            Ok(record) => {
                if !seen.insert(record.request_id.clone()) {
                    debug!(local_id = entry.local_id, request_id = %record.request_id, "duplicate request id in batch");
                }
                batch.push((entry.local_id, record));
            }
            Err(e) => undecodable.push((entry.local_id, format!("undecodable payload: {e}"))),
        }
    }
    (batch, undecodable)
}

fn log_dead_letters(outcome: &FailureOutcome, reason: &str) {
    if !outcome.dead_lettered.is_empty() {
        warn!(
            count = outcome.dead_lettered.len(),
            reason, "records exceeded retry ceiling, moved to dead letters"
        );
    }
}
