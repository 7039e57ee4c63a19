// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage record fixtures.

use meterr_core::{CallStatus, Tags, UsageRecord, now_millis};

/// A successful gpt-4 call: 1000 input tokens, 500 output tokens, $0.06.
pub fn sample_record() -> UsageRecord {
    let mut tags = Tags::new();
    tags.insert("env".into(), "test".into());
    UsageRecord {
        timestamp: now_millis(),
        model: "gpt-4".into(),
        input_tokens: 1000,
        output_tokens: 500,
        total_tokens: 1500,
        cost: 0.06,
        team: Some("platform".into()),
        project: Some("meterr".into()),
        tags,
        request_id: uuid::Uuid::new_v4().to_string(),
        endpoint: "chat.completions".into(),
        latency_ms: 842.5,
        status: CallStatus::Ok,
        error: None,
    }
}

/// `n` distinct sample records with request ids `req-0` .. `req-{n-1}`.
pub fn sample_records(n: usize) -> Vec<UsageRecord> {
    (0..n)
        .map(|i| UsageRecord {
            request_id: format!("req-{i}"),
            input_tokens: 100 + i as u32,
            total_tokens: 600 + i as u32,
            ..sample_record()
        })
        .collect()
}
