// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operations on the pending `queue` table.
//!
//! Draining is non-destructive: `dequeue_batch` only reads. Entries leave
//! the table through `ack` (delivered) or a move to `dead_letter`.

use meterr_core::MeterrError;
use rusqlite::{Transaction, params};

use crate::database::{Database, map_tr_err};
use crate::models::{FailureOutcome, QueueEntry, QueueStats};

/// Append a payload. Returns its `local_id`, which fixes its drain position.
pub async fn enqueue(db: &Database, payload: &str) -> Result<i64, MeterrError> {
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute("INSERT INTO queue (payload) VALUES (?1)", params![payload])?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` oldest entries, in insertion order.
pub async fn dequeue_batch(db: &Database, limit: usize) -> Result<Vec<QueueEntry>, MeterrError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<QueueEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT local_id, payload, created_at, retry_count
                 FROM queue
                 ORDER BY local_id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(QueueEntry {
                    local_id: row.get(0)?,
                    payload: row.get(1)?,
                    created_at: row.get(2)?,
                    retry_count: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Remove delivered entries. Unknown ids are ignored, so acking the same
/// set twice is harmless. Returns how many rows were removed.
pub async fn ack(db: &Database, ids: &[i64]) -> Result<usize, MeterrError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut removed = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM queue WHERE local_id = ?1")?;
                for id in &ids {
                    removed += stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}

/// Increment one entry's retry count. Returns the new count, or `None` if
/// the entry is no longer queued.
pub async fn mark_retry(db: &Database, id: i64) -> Result<Option<u32>, MeterrError> {
    db.connection()
        .call(move |conn| -> Result<Option<u32>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let count = increment_retry(&tx, id)?;
            tx.commit()?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed delivery attempt for `ids` in one transaction.
///
/// Each entry's retry count is incremented; entries whose count now exceeds
/// `max_retries` move to `dead_letter` with `reason` as their last error.
pub async fn record_failures(
    db: &Database,
    ids: &[i64],
    max_retries: u32,
    reason: &str,
) -> Result<FailureOutcome, MeterrError> {
    if ids.is_empty() {
        return Ok(FailureOutcome::default());
    }
    let ids = ids.to_vec();
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| -> Result<FailureOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut outcome = FailureOutcome::default();
            for id in ids {
                let Some(count) = increment_retry(&tx, id)? else {
                    continue;
                };
                if count > max_retries {
                    move_to_dead_letter(&tx, id, &reason)?;
                    outcome.dead_lettered.push(id);
                } else {
                    outcome.retried.push((id, count));
                }
            }
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Move entries straight to `dead_letter`, each with its own reason.
///
/// Used for payloads that can never succeed (undecodable, or refused by the
/// collector). Returns how many entries were moved.
pub async fn dead_letter(db: &Database, entries: &[(i64, String)]) -> Result<usize, MeterrError> {
    if entries.is_empty() {
        return Ok(0);
    }
    let entries = entries.to_vec();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut moved = 0;
            for (id, reason) in &entries {
                if move_to_dead_letter(&tx, *id, reason)? {
                    moved += 1;
                }
            }
            tx.commit()?;
            Ok(moved)
        })
        .await
        .map_err(map_tr_err)
}

/// Number of pending entries.
pub async fn depth(db: &Database) -> Result<u64, MeterrError> {
    db.connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))
        })
        .await
        .map(to_count)
        .map_err(map_tr_err)
}

/// Pending depth, oldest entry, highest retry count and dead-letter count.
pub async fn stats(db: &Database) -> Result<QueueStats, MeterrError> {
    db.connection()
        .call(|conn| -> Result<QueueStats, rusqlite::Error> {
            let (pending, oldest_created_at, max_retry_count): (i64, Option<String>, u32) = conn
                .query_row(
                    "SELECT COUNT(*), MIN(created_at), COALESCE(MAX(retry_count), 0) FROM queue",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;
            let dead_letters: i64 =
                conn.query_row("SELECT COUNT(*) FROM dead_letter", [], |row| row.get(0))?;
            Ok(QueueStats {
                pending: to_count(pending),
                dead_letters: to_count(dead_letters),
                oldest_created_at,
                max_retry_count,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub(crate) fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn increment_retry(tx: &Transaction<'_>, id: i64) -> Result<Option<u32>, rusqlite::Error> {
    let updated = tx.execute(
        "UPDATE queue SET retry_count = retry_count + 1 WHERE local_id = ?1",
        params![id],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    let count = tx.query_row(
        "SELECT retry_count FROM queue WHERE local_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(Some(count))
}

/// Returns false if `id` was not in the queue.
fn move_to_dead_letter(tx: &Transaction<'_>, id: i64, reason: &str) -> Result<bool, rusqlite::Error> {
    let copied = tx.execute(
        "INSERT OR REPLACE INTO dead_letter (local_id, payload, created_at, retry_count, last_error)
         SELECT local_id, payload, created_at, retry_count, ?2 FROM queue WHERE local_id = ?1",
        params![id, reason],
    )?;
    tx.execute("DELETE FROM queue WHERE local_id = ?1", params![id])?;
    Ok(copied > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn drain_order_is_insertion_order() {
        let (db, _dir) = setup_db().await;
        for payload in ["A", "B", "C"] {
            enqueue(&db, payload).await.unwrap();
        }

        let batch = dequeue_batch(&db, 10).await.unwrap();
        let payloads: Vec<&str> = batch.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["A", "B", "C"]);
        assert!(batch.iter().all(|e| e.retry_count == 0));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_respects_limit_and_does_not_remove() {
        let (db, _dir) = setup_db().await;
        for i in 0..5 {
            enqueue(&db, &format!("p{i}")).await.unwrap();
        }

        let first = dequeue_batch(&db, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].payload, "p0");

        let again = dequeue_batch(&db, 2).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(depth(&db).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn ack_twice_is_a_noop() {
        let (db, _dir) = setup_db().await;
        let a = enqueue(&db, "a").await.unwrap();
        let b = enqueue(&db, "b").await.unwrap();
        enqueue(&db, "c").await.unwrap();

        assert_eq!(ack(&db, &[a, b]).await.unwrap(), 2);
        assert_eq!(ack(&db, &[a, b]).await.unwrap(), 0);

        let remaining = dequeue_batch(&db, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].payload, "c");
    }

    #[tokio::test]
    async fn mark_retry_increments() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "x").await.unwrap();

        assert_eq!(mark_retry(&db, id).await.unwrap(), Some(1));
        assert_eq!(mark_retry(&db, id).await.unwrap(), Some(2));
        assert_eq!(mark_retry(&db, id + 100).await.unwrap(), None);

        let entry = &dequeue_batch(&db, 1).await.unwrap()[0];
        assert_eq!(entry.retry_count, 2);
    }

    #[tokio::test]
    async fn exceeding_max_retries_moves_to_dead_letter() {
        let (db, _dir) = setup_db().await;
        let doomed = enqueue(&db, "doomed").await.unwrap();

        for attempt in 1..=10 {
            let outcome = record_failures(&db, &[doomed], 10, "collector down")
                .await
                .unwrap();
            assert_eq!(outcome.retried, vec![(doomed, attempt)]);
        }

        let outcome = record_failures(&db, &[doomed], 10, "collector down")
            .await
            .unwrap();
        assert_eq!(outcome.dead_lettered, vec![doomed]);
        assert!(dequeue_batch(&db, 10).await.unwrap().is_empty());

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.dead_letters, 1);
    }

    #[tokio::test]
    async fn dead_letter_moves_with_reason() {
        let (db, _dir) = setup_db().await;
        let bad = enqueue(&db, "{broken").await.unwrap();
        let good = enqueue(&db, "{}").await.unwrap();

        let moved = dead_letter(&db, &[(bad, "undecodable".into()), (999, "gone".into())])
            .await
            .unwrap();
        assert_eq!(moved, 1);

        let pending = dequeue_batch(&db, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, good);
    }

    #[tokio::test]
    async fn stats_on_empty_queue() {
        let (db, _dir) = setup_db().await;
        let stats = stats(&db).await.unwrap();
        assert_eq!(stats, QueueStats::default());
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_all_persisted() {
        let (db, _dir) = setup_db().await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                enqueue(&db, &format!(r#"{{"n":{i}}}"#)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let batch = dequeue_batch(&db, 100).await.unwrap();
        assert_eq!(batch.len(), 20);
        assert!(batch.windows(2).all(|w| w[0].local_id < w[1].local_id));
    }
}
