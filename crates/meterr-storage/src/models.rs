// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the queue and dead-letter tables.

use chrono::{DateTime, NaiveDateTime, Utc};
use meterr_core::{MeterrError, UsageRecord};
use serde::Serialize;

/// SQLite `CURRENT_TIMESTAMP` format.
const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// One pending row in the `queue` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub local_id: i64,
    /// Serialized [`UsageRecord`] JSON.
    pub payload: String,
    pub created_at: String,
    pub retry_count: u32,
}

impl QueueEntry {
    /// Deserialize the stored record.
    pub fn decode(&self) -> Result<UsageRecord, MeterrError> {
        Ok(serde_json::from_str(&self.payload)?)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

/// A record parked in the `dead_letter` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    pub local_id: i64,
    pub payload: String,
    pub created_at: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub dead_at: String,
}

impl DeadLetter {
    pub fn decode(&self) -> Result<UsageRecord, MeterrError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Snapshot of queue health for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub dead_letters: u64,
    /// `created_at` of the oldest pending entry.
    pub oldest_created_at: Option<String>,
    pub max_retry_count: u32,
}

impl QueueStats {
    /// Age of the oldest pending entry relative to `now`.
    pub fn oldest_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.oldest_created_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|created| now - created)
    }
}

/// Result of marking a set of entries as failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureOutcome {
    /// Entries left in the queue, with their new retry count.
    pub retried: Vec<(i64, u32)>,
    /// Entries moved to the dead-letter table.
    pub dead_lettered: Vec<i64>,
}

impl FailureOutcome {
    /// Highest retry count among entries still queued.
    pub fn max_retry_count(&self) -> u32 {
        self.retried.iter().map(|(_, n)| *n).max().unwrap_or(0)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_timestamps() {
        let entry = QueueEntry {
            local_id: 1,
            payload: "{}".into(),
            created_at: "2026-03-01 12:00:00".into(),
            retry_count: 0,
        };
        let created = entry.created_at_utc().unwrap();
        assert_eq!(created.to_rfc3339(), "2026-03-01T12:00:00+00:00");
    }

    #[test]
    fn oldest_age_is_relative_to_now() {
        let stats = QueueStats {
            pending: 1,
            oldest_created_at: Some("2026-03-01 12:00:00".into()),
            ..Default::default()
        };
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:05:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(stats.oldest_age(now), Some(chrono::Duration::minutes(5)));
    }

    #[test]
    fn undecodable_payload_is_a_serialization_error() {
        let entry = QueueEntry {
            local_id: 1,
            payload: "not json".into(),
            created_at: String::new(),
            retry_count: 0,
        };
        assert!(matches!(
            entry.decode(),
            Err(MeterrError::Serialization { .. })
        ));
    }
}
