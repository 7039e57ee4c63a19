// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable queue of usage records.
//!
//! Typed front for the query modules: records go in as [`UsageRecord`]s and
//! come back as [`QueueEntry`]s that can be decoded. Cheap to clone; every
//! clone shares the same single-writer connection.

use meterr_config::model::QueueConfig;
use meterr_core::{MeterrError, UsageRecord};
use tracing::{debug, info};

use crate::database::Database;
use crate::models::{DeadLetter, FailureOutcome, QueueEntry, QueueStats};
use crate::queries::{dead_letter, queue};

#[derive(Clone)]
pub struct UsageQueue {
    db: Database,
}

impl UsageQueue {
    /// Open the queue described by `config`.
    pub async fn open(config: &QueueConfig) -> Result<Self, MeterrError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        let queue = Self { db };
        let pending = queue.depth().await?;
        info!(path = %config.database_path, pending, "usage queue opened");
        Ok(queue)
    }

    /// Open a WAL-mode queue at `path`.
    pub async fn open_path(path: &str) -> Result<Self, MeterrError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persist `record`. Once this returns the record survives a crash.
    pub async fn enqueue(&self, record: &UsageRecord) -> Result<i64, MeterrError> {
        let payload = serde_json::to_string(record)?;
        let local_id = queue::enqueue(&self.db, &payload).await?;
        debug!(local_id, request_id = %record.request_id, "usage record queued");
        Ok(local_id)
    }

    /// Up to `limit` oldest entries, without removing them.
    pub async fn dequeue_batch(&self, limit: usize) -> Result<Vec<QueueEntry>, MeterrError> {
        queue::dequeue_batch(&self.db, limit).await
    }

    /// Remove delivered entries. Idempotent.
    pub async fn ack(&self, ids: &[i64]) -> Result<usize, MeterrError> {
        queue::ack(&self.db, ids).await
    }

    pub async fn mark_retry(&self, id: i64) -> Result<Option<u32>, MeterrError> {
        queue::mark_retry(&self.db, id).await
    }

    /// Count a failed attempt against each entry, dead-lettering any that
    /// exceed `max_retries`.
    pub async fn record_failures(
        &self,
        ids: &[i64],
        max_retries: u32,
        reason: &str,
    ) -> Result<FailureOutcome, MeterrError> {
        queue::record_failures(&self.db, ids, max_retries, reason).await
    }

    /// Dead-letter entries immediately, bypassing the retry budget.
    pub async fn dead_letter(&self, entries: &[(i64, String)]) -> Result<usize, MeterrError> {
        queue::dead_letter(&self.db, entries).await
    }

    pub async fn depth(&self) -> Result<u64, MeterrError> {
        queue::depth(&self.db).await
    }

    pub async fn stats(&self) -> Result<QueueStats, MeterrError> {
        queue::stats(&self.db).await
    }

    pub async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, MeterrError> {
        dead_letter::list(&self.db, limit).await
    }

    pub async fn requeue(&self, ids: &[i64]) -> Result<usize, MeterrError> {
        let moved = dead_letter::requeue(&self.db, ids).await?;
        info!(requested = ids.len(), moved, "dead letters requeued");
        Ok(moved)
    }

    pub async fn requeue_all(&self) -> Result<usize, MeterrError> {
        let moved = dead_letter::requeue_all(&self.db).await?;
        info!(moved, "all dead letters requeued");
        Ok(moved)
    }

    /// Checkpoint the WAL before shutdown.
    pub async fn close(&self) -> Result<(), MeterrError> {
        self.db.close().await
    }
}
