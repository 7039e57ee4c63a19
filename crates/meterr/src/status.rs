// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `meterr status` and `meterr flush` command implementations.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::Utc;
use meterr_config::model::MeterrConfig;
use meterr_core::MeterrError;
use meterr_delivery::{DeliveryEngine, DeliverySettings, FlushReport, HttpCollector};
use meterr_storage::{QueueStats, UsageQueue};
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub pending: u64,
    pub dead_letters: u64,
    pub oldest_age_secs: Option<i64>,
    pub oldest_age_human: Option<String>,
    pub max_retry_count: u32,
    pub collector: String,
}

impl StatusResponse {
    fn new(config: &MeterrConfig, stats: &QueueStats) -> Self {
        let age = stats.oldest_age(Utc::now());
        Self {
            database_path: config.queue.database_path.clone(),
            pending: stats.pending,
            dead_letters: stats.dead_letters,
            oldest_age_secs: age.map(|a| a.num_seconds()),
            oldest_age_human: age.map(|a| format_age(a.num_seconds())),
            max_retry_count: stats.max_retry_count,
            collector: config.collector.endpoint.clone(),
        }
    }
}

/// Format seconds into a human-readable duration string.
fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

/// Run the `meterr status` command.
pub async fn run_status(config: &MeterrConfig, json: bool, plain: bool) -> Result<(), MeterrError> {
    let queue = UsageQueue::open(&config.queue).await?;
    let stats = queue.stats().await?;
    queue.close().await?;

    let status = StatusResponse::new(config, &stats);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&status, use_color);
    }
    Ok(())
}

fn print_status(status: &StatusResponse, use_color: bool) {
    println!();
    println!("  meterr status");
    println!("  {}", "-".repeat(35));
    println!("    Queue:        {}", status.database_path);
    println!("    Collector:    {}", status.collector);
    println!("    Pending:      {}", status.pending);
    match &status.oldest_age_human {
        Some(age) => println!("    Oldest:       {age} ago"),
        None => println!("    Oldest:       -"),
    }
    println!("    Max retries:  {}", status.max_retry_count);

    if status.dead_letters == 0 {
        println!("    Dead letters: 0");
    } else if use_color {
        use colored::Colorize;
        println!(
            "    Dead letters: {} {}",
            "!".yellow(),
            status.dead_letters.to_string().yellow()
        );
    } else {
        println!("    Dead letters: [WARN] {}", status.dead_letters);
    }
    println!();
}

/// Run the `meterr flush` command.
///
/// Drives delivery cycles against the configured collector until the queue
/// is empty or a cycle fails.
pub async fn run_flush(config: &MeterrConfig, plain: bool) -> Result<(), MeterrError> {
    let queue = UsageQueue::open(&config.queue).await?;
    let collector = HttpCollector::from_config(&config.collector)?;
    let engine = DeliveryEngine::new(
        queue.clone(),
        Arc::new(collector),
        DeliverySettings::from(&config.delivery),
    );

    let report = engine.flush().await;
    let remaining = queue.depth().await;
    queue.close().await?;
    let report = report?;

    let use_color = !plain && std::io::stdout().is_terminal();
    print_flush(&report, remaining?, use_color);
    match report.last_error {
        Some(error) => Err(MeterrError::Delivery {
            message: format!("flush stopped early: {error}"),
            source: None,
        }),
        None => Ok(()),
    }
}

fn print_flush(report: &FlushReport, remaining: u64, use_color: bool) {
    let summary = format!(
        "{} delivered, {} retried, {} dead-lettered, {} pending",
        report.acked, report.retried, report.dead_lettered, remaining
    );
    if !use_color {
        let tag = if report.last_error.is_some() { "[FAIL]" } else { "[OK]" };
        println!("  {tag} {summary}");
        return;
    }

    use colored::Colorize;
    if report.last_error.is_some() {
        println!("  {} {}", "✗".red(), summary);
    } else {
        println!("  {} {}", "✓".green(), summary);
    }
}
