// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the durable usage queue.

use meterr_config::model::QueueConfig;
use meterr_core::CallStatus;
use meterr_storage::UsageQueue;
use meterr_test_utils::{sample_record, sample_records};
use tempfile::tempdir;

#[tokio::test]
async fn queued_record_round_trips_exactly() {
    let dir = tempdir().unwrap();
    let queue = UsageQueue::open_path(dir.path().join("q.db").to_str().unwrap())
        .await
        .unwrap();

    let mut failed = sample_record();
    failed.status = CallStatus::Error;
    failed.error = Some("upstream 500".into());
    failed.cost = 0.000_123_456_789_012_345;

    let original = vec![sample_record(), failed];
    for record in &original {
        queue.enqueue(record).await.unwrap();
    }

    let drained: Vec<_> = queue
        .dequeue_batch(10)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.decode().unwrap())
        .collect();
    assert_eq!(drained, original);
}

#[tokio::test]
async fn entries_survive_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("q.db");
    let config = QueueConfig {
        database_path: path.to_str().unwrap().to_string(),
        wal_mode: true,
    };

    let record = sample_record();
    {
        let queue = UsageQueue::open(&config).await.unwrap();
        queue.enqueue(&record).await.unwrap();
        // Dropped without close: nothing but the enqueue itself persisted it.
    }

    let reopened = UsageQueue::open(&config).await.unwrap();
    let batch = reopened.dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].decode().unwrap(), record);
}

#[tokio::test]
async fn sequential_enqueues_drain_in_order() {
    let dir = tempdir().unwrap();
    let queue = UsageQueue::open_path(dir.path().join("q.db").to_str().unwrap())
        .await
        .unwrap();

    let records = sample_records(3);
    for record in &records {
        queue.enqueue(record).await.unwrap();
    }

    let ids: Vec<String> = queue
        .dequeue_batch(10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.decode().unwrap().request_id)
        .collect();
    assert_eq!(ids, vec!["req-0", "req-1", "req-2"]);
}

#[tokio::test]
async fn retried_past_ceiling_is_excluded_from_drains() {
    let dir = tempdir().unwrap();
    let queue = UsageQueue::open_path(dir.path().join("q.db").to_str().unwrap())
        .await
        .unwrap();

    let doomed = queue.enqueue(&sample_record()).await.unwrap();
    let survivor = queue.enqueue(&sample_record()).await.unwrap();

    for _ in 0..11 {
        queue
            .record_failures(&[doomed], 10, "collector returned 503")
            .await
            .unwrap();
    }

    let batch = queue.dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].local_id, survivor);

    let letters = queue.dead_letters(10).await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].local_id, doomed);
    assert_eq!(letters[0].retry_count, 11);
    assert!(letters[0].decode().is_ok());

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.dead_letters, 1);
}

#[tokio::test]
async fn requeued_dead_letters_are_drained_again() {
    let dir = tempdir().unwrap();
    let queue = UsageQueue::open_path(dir.path().join("q.db").to_str().unwrap())
        .await
        .unwrap();

    let record = sample_record();
    let id = queue.enqueue(&record).await.unwrap();
    queue.dead_letter(&[(id, "rejected: bad schema".into())]).await.unwrap();
    assert_eq!(queue.depth().await.unwrap(), 0);

    assert_eq!(queue.requeue_all().await.unwrap(), 1);
    let batch = queue.dequeue_batch(10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].retry_count, 0);
    assert_eq!(batch[0].decode().unwrap(), record);

    queue.close().await.unwrap();
}
