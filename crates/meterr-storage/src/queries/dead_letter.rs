// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspection and requeue of dead-lettered records.

use meterr_core::MeterrError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::DeadLetter;
use crate::queries::queue::to_count;

/// Up to `limit` dead letters, most recent first.
pub async fn list(db: &Database, limit: usize) -> Result<Vec<DeadLetter>, MeterrError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<Vec<DeadLetter>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT local_id, payload, created_at, retry_count, last_error, dead_at
                 FROM dead_letter
                 ORDER BY dead_at DESC, local_id DESC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(DeadLetter {
                    local_id: row.get(0)?,
                    payload: row.get(1)?,
                    created_at: row.get(2)?,
                    retry_count: row.get(3)?,
                    last_error: row.get(4)?,
                    dead_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<u64, MeterrError> {
    db.connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row("SELECT COUNT(*) FROM dead_letter", [], |row| row.get(0))
        })
        .await
        .map(to_count)
        .map_err(map_tr_err)
}

/// Move the given dead letters back to the live queue with a fresh retry
/// budget. They are appended, so they drain after everything already
/// pending. Unknown ids are skipped. Returns how many were requeued.
pub async fn requeue(db: &Database, ids: &[i64]) -> Result<usize, MeterrError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut moved = 0;
            {
                let mut copy = tx.prepare(
                    "INSERT INTO queue (payload, created_at, retry_count)
                     SELECT payload, created_at, 0 FROM dead_letter WHERE local_id = ?1",
                )?;
                let mut remove = tx.prepare("DELETE FROM dead_letter WHERE local_id = ?1")?;
                for id in &ids {
                    if copy.execute(params![id])? > 0 {
                        remove.execute(params![id])?;
                        moved += 1;
                    }
                }
            }
            tx.commit()?;
            Ok(moved)
        })
        .await
        .map_err(map_tr_err)
}

/// Requeue every dead letter, oldest original entry first.
pub async fn requeue_all(db: &Database) -> Result<usize, MeterrError> {
    db.connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let moved = tx.execute(
                "INSERT INTO queue (payload, created_at, retry_count)
                 SELECT payload, created_at, 0 FROM dead_letter ORDER BY local_id ASC",
                [],
            )?;
            tx.execute("DELETE FROM dead_letter", [])?;
            tx.commit()?;
            Ok(moved)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::queue;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn list_shows_last_error() {
        let (db, _dir) = setup_db().await;
        let id = queue::enqueue(&db, "payload").await.unwrap();
        queue::record_failures(&db, &[id], 0, "503 Service Unavailable")
            .await
            .unwrap();

        let letters = list(&db, 10).await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].local_id, id);
        assert_eq!(letters[0].retry_count, 1);
        assert_eq!(letters[0].last_error.as_deref(), Some("503 Service Unavailable"));
        assert_eq!(count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn requeue_resets_retry_count_and_appends() {
        let (db, _dir) = setup_db().await;
        let dead = queue::enqueue(&db, "dead").await.unwrap();
        queue::record_failures(&db, &[dead], 0, "boom").await.unwrap();
        queue::enqueue(&db, "live").await.unwrap();

        assert_eq!(requeue(&db, &[dead, 12345]).await.unwrap(), 1);
        assert_eq!(count(&db).await.unwrap(), 0);

        let pending = queue::dequeue_batch(&db, 10).await.unwrap();
        let payloads: Vec<&str> = pending.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["live", "dead"]);
        assert_eq!(pending[1].retry_count, 0);
    }

    #[tokio::test]
    async fn requeue_all_empties_dead_letters() {
        let (db, _dir) = setup_db().await;
        let mut ids = Vec::new();
        for i in 0..3 {
            ids.push(queue::enqueue(&db, &format!("p{i}")).await.unwrap());
        }
        queue::record_failures(&db, &ids, 0, "boom").await.unwrap();

        assert_eq!(requeue_all(&db).await.unwrap(), 3);
        assert_eq!(count(&db).await.unwrap(), 0);
        let pending = queue::dequeue_batch(&db, 10).await.unwrap();
        let payloads: Vec<&str> = pending.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, vec!["p0", "p1", "p2"]);
    }
}
