// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The owned tracking context.
//!
//! [`Meterr`] bundles the estimator, pricing, durable queue, collector and
//! delivery engine behind one handle with an explicit lifecycle:
//! [`MeterrBuilder::build`] opens the queue and starts the engine,
//! [`Meterr::shutdown`] drains in-flight telemetry and closes the queue.
//!
//! Nothing here returns telemetry errors to callers. Failures are logged
//! and summarized as a [`RecordOutcome`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use meterr_config::MeterrConfig;
use meterr_core::{Collector, Content, MeterrError, UsageRecord};
use meterr_cost::{
    CompletedCall, CostCalculator, Labels, PricingTable, TokenEstimator, UsageRecordFactory,
};
use meterr_delivery::{DeliveryEngine, DeliverySettings, EngineHandle, FlushReport, HttpCollector};
use meterr_storage::{QueueStats, UsageQueue};
use strum::Display;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::tracked::Tracked;

/// What happened to one usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecordOutcome {
    /// Accepted by the collector on the immediate path.
    Delivered,
    /// Persisted to the durable queue for the delivery engine.
    Queued,
    /// Could not be delivered or persisted. Already logged.
    Dropped,
}

/// Builder for [`Meterr`].
pub struct MeterrBuilder {
    config: MeterrConfig,
    collector: Option<Arc<dyn Collector>>,
    queue: Option<UsageQueue>,
    estimator: Option<TokenEstimator>,
    pricing: Option<PricingTable>,
}

impl MeterrBuilder {
    /// Use `collector` instead of the configured HTTP collector.
    pub fn collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Use an already-open queue instead of opening `queue.database_path`.
    pub fn queue(mut self, queue: UsageQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn estimator(mut self, estimator: TokenEstimator) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Replace the built-in pricing table. Config overrides still apply.
    pub fn pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Open the queue and start the delivery engine.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn build(self) -> Result<Meterr, MeterrError> {
        let config = self.config;

        let queue = match self.queue {
            Some(queue) => queue,
            None => UsageQueue::open(&config.queue).await?,
        };
        let collector: Arc<dyn Collector> = match self.collector {
            Some(collector) => collector,
            None => Arc::new(HttpCollector::from_config(&config.collector)?),
        };

        let pricing = self
            .pricing
            .unwrap_or_default()
            .with_overrides(&config.pricing);
        let factory = UsageRecordFactory::new(
            Arc::new(CostCalculator::new(pricing)),
            Labels::from(&config.tracking),
        );

        let engine = Arc::new(DeliveryEngine::new(
            queue.clone(),
            Arc::clone(&collector),
            DeliverySettings::from(&config.delivery),
        ));
        let engine_handle = engine.handle();
        let cancel = CancellationToken::new();
        let engine_task = {
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.run(cancel).await })
        };

        info!(
            collector = collector.name(),
            immediate_send = config.delivery.immediate_send,
            "meterr tracking started"
        );

        Ok(Meterr {
            inner: Arc::new(Inner {
                estimator: self.estimator.unwrap_or_default(),
                factory,
                queue,
                collector,
                engine,
                engine_handle,
                immediate_send: config.delivery.immediate_send,
                send_timeout: config.collector.timeout(),
                last_cost: Mutex::new(None),
                tasks: TaskTracker::new(),
                cancel,
                engine_task: tokio::sync::Mutex::new(Some(engine_task)),
            }),
        })
    }
}

/// Tracking context. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Meterr {
    inner: Arc<Inner>,
}

struct Inner {
    estimator: TokenEstimator,
    factory: UsageRecordFactory,
    queue: UsageQueue,
    collector: Arc<dyn Collector>,
    engine: Arc<DeliveryEngine>,
    engine_handle: EngineHandle,
    immediate_send: bool,
    send_timeout: Duration,
    last_cost: Mutex<Option<f64>>,
    tasks: TaskTracker,
    cancel: CancellationToken,
    engine_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Meterr {
    pub fn builder(config: MeterrConfig) -> MeterrBuilder {
        MeterrBuilder {
            config,
            collector: None,
            queue: None,
            estimator: None,
            pricing: None,
        }
    }

    /// Tokens in `content` for `model`. Never fails.
    pub fn estimate_tokens(&self, content: &Content, model: &str) -> u32 {
        self.inner.estimator.estimate(content, model)
    }

    /// Cost in USD of a call. Unknown models are priced by the default
    /// entry and logged.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.inner
            .factory
            .calculator()
            .cost(model, input_tokens, output_tokens)
            .cost_usd
    }

    /// Cost of the most recent call recorded through this context.
    pub fn get_last_request_cost(&self) -> Option<f64> {
        *self
            .inner
            .last_cost
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver or persist one record.
    ///
    /// Tries the collector directly when immediate send is enabled, and
    /// falls back to the durable queue on any failure.
    pub async fn record_usage(&self, record: UsageRecord) -> RecordOutcome {
        self.set_last_cost(record.cost);
        self.inner.deliver(record).await
    }

    /// Build a record from `call` and hand it to a background task.
    ///
    /// Returns the record as built; delivery happens off the caller's path.
    pub fn observe(&self, call: CompletedCall) -> UsageRecord {
        let record = self.inner.factory.build(call);
        self.set_last_cost(record.cost);
        debug!(
            model = %record.model,
            request_id = %record.request_id,
            cost_usd = record.cost,
            status = %record.status,
            "usage recorded"
        );

        let inner = Arc::clone(&self.inner);
        let background = record.clone();
        self.inner.tasks.spawn(async move {
            inner.deliver(background).await;
        });
        record
    }

    /// Wrap `client` so every call through it is metered.
    pub fn track<C>(&self, client: C) -> Tracked<C> {
        Tracked::new(client, self.clone())
    }

    /// Run delivery cycles now until the queue is empty or a cycle fails.
    pub async fn flush(&self) -> Result<FlushReport, MeterrError> {
        self.inner.engine.flush().await
    }

    pub async fn stats(&self) -> Result<QueueStats, MeterrError> {
        self.inner.queue.stats().await
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.inner.engine_handle
    }

    /// Wait for in-flight telemetry, stop the engine, make one last
    /// delivery attempt and checkpoint the queue.
    ///
    /// Records that still cannot be delivered stay queued for next time.
    pub async fn shutdown(&self) -> Result<(), MeterrError> {
        let inner = &self.inner;
        inner.tasks.close();
        inner.tasks.wait().await;

        inner.cancel.cancel();
        if let Some(task) = inner.engine_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "delivery engine task ended abnormally");
            }
        }

        match inner.engine.flush().await {
            Ok(report) => info!(
                acked = report.acked,
                retried = report.retried,
                "final delivery attempt complete"
            ),
            Err(e) => warn!(error = %e, "final delivery attempt failed"),
        }

        let pending = inner.queue.depth().await?;
        inner.queue.close().await?;
        info!(pending, "meterr tracking stopped");
        Ok(())
    }

    pub(crate) fn estimator(&self) -> &TokenEstimator {
        &self.inner.estimator
    }

    fn set_last_cost(&self, cost: f64) {
        *self
            .inner
            .last_cost
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cost);
    }
}

impl Drop for Inner {
    // The engine task holds its own references, so it must be told to stop
    // when the last handle goes away without `shutdown()`.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Inner {
    async fn deliver(&self, record: UsageRecord) -> RecordOutcome {
        if self.immediate_send {
            match self.send_now(&record).await {
                Ok(()) => return RecordOutcome::Delivered,
                Err(e) => debug!(
                    request_id = %record.request_id,
                    error = %e,
                    "immediate send failed, queueing"
                ),
            }
        }

        match self.queue.enqueue(&record).await {
            Ok(_) => {
                self.engine_handle.wake();
                RecordOutcome::Queued
            }
            Err(e) => {
                error!(
                    request_id = %record.request_id,
                    model = %record.model,
                    error = %e,
                    "failed to persist usage record, dropping it"
                );
                RecordOutcome::Dropped
            }
        }
    }

    async fn send_now(&self, record: &UsageRecord) -> Result<(), MeterrError> {
        let batch = std::slice::from_ref(record);
        let receipt = tokio::time::timeout(self.send_timeout, self.collector.send_batch(batch))
            .await
            .map_err(|_| MeterrError::Timeout {
                duration: self.send_timeout,
            })??;

        if let Some(reason) = receipt.rejection_reason(&record.request_id) {
            return Err(MeterrError::Collector {
                status: 200,
                message: format!("record rejected: {reason}"),
            });
        }
        if !receipt.accepted_set().contains(record.request_id.as_str()) {
            return Err(MeterrError::Collector {
                status: 200,
                message: "record not acknowledged".into(),
            });
        }
        Ok(())
    }
}
