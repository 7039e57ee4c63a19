// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `meterr dead-letters` and `meterr requeue` command implementations.
//!
//! Dead letters are records that exhausted their retry budget. They are
//! never discarded; an operator lists them here and moves them back to the
//! live queue once the collector problem is fixed.

use meterr_config::model::MeterrConfig;
use meterr_core::MeterrError;
use meterr_storage::{DeadLetter, UsageQueue};
use serde::Serialize;

/// One dead letter in `--json` output.
#[derive(Debug, Serialize)]
pub struct DeadLetterView {
    pub local_id: i64,
    pub request_id: Option<String>,
    pub model: Option<String>,
    pub cost: Option<f64>,
    pub retry_count: u32,
    pub created_at: String,
    pub dead_at: String,
    pub last_error: Option<String>,
}

impl From<&DeadLetter> for DeadLetterView {
    fn from(letter: &DeadLetter) -> Self {
        let record = letter.decode().ok();
        Self {
            local_id: letter.local_id,
            request_id: record.as_ref().map(|r| r.request_id.clone()),
            model: record.as_ref().map(|r| r.model.clone()),
            cost: record.as_ref().map(|r| r.cost),
            retry_count: letter.retry_count,
            created_at: letter.created_at.clone(),
            dead_at: letter.dead_at.clone(),
            last_error: letter.last_error.clone(),
        }
    }
}

/// Run the `meterr dead-letters` command.
pub async fn run_list(config: &MeterrConfig, limit: usize, json: bool) -> Result<(), MeterrError> {
    let queue = UsageQueue::open(&config.queue).await?;
    let letters = queue.dead_letters(limit).await?;
    let total = queue.stats().await?.dead_letters;
    queue.close().await?;

    let views: Vec<DeadLetterView> = letters.iter().map(DeadLetterView::from).collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&views).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }

    if views.is_empty() {
        println!("No dead letters.");
        return Ok(());
    }

    println!(
        "  {:<8} {:<38} {:<20} {:>7}  {}",
        "ID", "REQUEST", "MODEL", "RETRIES", "LAST ERROR"
    );
    for view in &views {
        println!(
            "  {:<8} {:<38} {:<20} {:>7}  {}",
            view.local_id,
            view.request_id.as_deref().unwrap_or("<undecodable>"),
            view.model.as_deref().unwrap_or("-"),
            view.retry_count,
            view.last_error.as_deref().unwrap_or("-"),
        );
    }
    if total > views.len() as u64 {
        println!();
        println!("  Showing {} of {total}. Use --limit to see more.", views.len());
    }
    Ok(())
}

/// Run the `meterr requeue` command.
pub async fn run_requeue(config: &MeterrConfig, all: bool, ids: &[i64]) -> Result<(), MeterrError> {
    let queue = UsageQueue::open(&config.queue).await?;
    let moved = if all {
        queue.requeue_all().await
    } else {
        queue.requeue(ids).await
    };
    queue.close().await?;
    let moved = moved?;

    if !all && moved < ids.len() {
        println!(
            "Requeued {moved} of {} dead letters; the rest were not found.",
            ids.len()
        );
    } else {
        println!("Requeued {moved} dead letters.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterr_test_utils::sample_records;

    async fn config_with_dead_letters(dir: &tempfile::TempDir) -> (MeterrConfig, Vec<i64>) {
        let mut config = MeterrConfig::default();
        config.queue.database_path = dir.path().join("q.db").to_str().unwrap().to_string();

        let queue = UsageQueue::open(&config.queue).await.unwrap();
        let mut ids = Vec::new();
        for record in sample_records(2) {
            let id = queue.enqueue(&record).await.unwrap();
            ids.push(id);
        }
        let failed: Vec<(i64, String)> = ids.iter().map(|id| (*id, "HTTP 503".into())).collect();
        queue.dead_letter(&failed).await.unwrap();
        queue.close().await.unwrap();
        (config, ids)
    }

    #[tokio::test]
    async fn view_decodes_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = config_with_dead_letters(&dir).await;

        let queue = UsageQueue::open(&config.queue).await.unwrap();
        let letters = queue.dead_letters(10).await.unwrap();
        let mut views: Vec<DeadLetterView> = letters.iter().map(DeadLetterView::from).collect();
        views.sort_by_key(|v| v.local_id);

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].request_id.as_deref(), Some("req-0"));
        assert_eq!(views[0].model.as_deref(), Some("gpt-4"));
        assert_eq!(views[0].last_error.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn requeue_moves_letters_back() {
        let dir = tempfile::tempdir().unwrap();
        let (config, ids) = config_with_dead_letters(&dir).await;

        run_list(&config, 10, true).await.unwrap();
        run_requeue(&config, false, &ids[..1]).await.unwrap();

        let queue = UsageQueue::open(&config.queue).await.unwrap();
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.dead_letters, 1);
        queue.close().await.unwrap();

        run_requeue(&config, true, &[]).await.unwrap();
        let queue = UsageQueue::open(&config.queue).await.unwrap();
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.dead_letters, 0);
        assert_eq!(stats.max_retry_count, 0);
    }
}
