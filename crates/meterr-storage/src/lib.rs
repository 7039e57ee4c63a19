// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe local queue for Meterr usage records.
//!
//! WAL-mode SQLite with embedded migrations, accessed through a single
//! `tokio-rusqlite` writer thread. Records stay in the `queue` table until
//! the collector confirms them; records that exhaust their retries move to
//! `dead_letter` for operator inspection.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod usage_queue;

pub use database::Database;
pub use models::{DeadLetter, FailureOutcome, QueueEntry, QueueStats};
pub use usage_queue::UsageQueue;
