// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The usage record and its supporting types.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outcome of the API call a usage record describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallStatus {
    Ok,
    Error,
}

/// A scalar tag value attached to a usage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    /// Non-finite values serialize as text; JSON has no number for them.
    #[serde(serialize_with = "serialize_float")]
    Float(f64),
    Text(String),
}

fn serialize_float<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_str(&value.to_string())
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Int(value)
    }
}

impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        TagValue::Int(i64::from(value))
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            TagValue::Float(value)
        } else {
            TagValue::Text(value.to_string())
        }
    }
}

/// Free-form labels. Ordered so serialized payloads are stable.
pub type Tags = BTreeMap<String, TagValue>;

/// One structured telemetry entry describing a single API call.
///
/// Records are built once by the usage record factory when a call completes
/// and are not modified afterwards. `request_id` is the idempotency key the
/// collector uses to discard duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Completion time, UTC, millisecond precision.
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Model identifier the call was made against.
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// Computed cost in USD.
    pub cost: f64,
    pub team: Option<String>,
    pub project: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    pub request_id: String,
    /// Logical operation name, e.g. "chat.completions".
    pub endpoint: String,
    pub latency_ms: f64,
    pub status: CallStatus,
    /// Failure description; present iff `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageRecord {
    /// Returns true if the wrapped call failed.
    pub fn is_error(&self) -> bool {
        self.status == CallStatus::Error
    }
}

/// Current UTC time truncated to whole milliseconds.
///
/// Records carry millisecond timestamps; truncating at creation keeps a
/// persisted record equal to the in-memory one after a round trip.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Serde adapter writing timestamps as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record() -> UsageRecord {
        let mut tags = Tags::new();
        tags.insert("env".into(), "production".into());
        tags.insert("retries".into(), 2.into());
        tags.insert("sampled".into(), true.into());
        tags.insert("weight".into(), 0.25.into());
        UsageRecord {
            timestamp: now_millis(),
            model: "gpt-4".into(),
            input_tokens: 1000,
            output_tokens: 500,
            total_tokens: 1500,
            cost: 0.06,
            team: Some("search".into()),
            project: None,
            tags,
            request_id: "req-1".into(),
            endpoint: "chat.completions".into(),
            latency_ms: 812.5,
            status: CallStatus::Ok,
            error: None,
        }
    }

    #[test]
    fn non_finite_float_tags_stay_decodable() {
        assert_eq!(TagValue::from(f64::NAN), TagValue::Text("NaN".into()));
        assert_eq!(TagValue::from(f64::INFINITY), TagValue::Text("inf".into()));
        assert_eq!(TagValue::from(0.5), TagValue::Float(0.5));

        let mut rec = record();
        rec.tags.insert("ratio".into(), f64::NEG_INFINITY.into());
        let json = serde_json::to_string(&rec).unwrap();
        let decoded: UsageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, rec);

        // Built directly, bypassing `From`, the payload still decodes.
        let mut raw = record();
        raw.tags.insert("ratio".into(), TagValue::Float(f64::NAN));
        let json = serde_json::to_string(&raw).unwrap();
        let decoded: UsageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.tags.get("ratio"), Some(&TagValue::Text("NaN".into())));
    }

    #[test]
    fn json_round_trip_preserves_all_fields() {
        let original = record();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: UsageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn timestamp_serializes_with_millisecond_precision() {
        let mut rec = record();
        rec.timestamp = DateTime::parse_from_rfc3339("2026-03-01T10:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["timestamp"], "2026-03-01T10:00:00.123Z");
    }

    #[test]
    fn error_field_omitted_for_successful_calls() {
        let json = serde_json::to_value(record()).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn float_tag_does_not_collapse_to_integer() {
        let mut rec = record();
        rec.tags.insert("ratio".into(), TagValue::Float(2.0));
        let json = serde_json::to_string(&rec).unwrap();
        let decoded: UsageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.tags["ratio"], TagValue::Float(2.0));
    }

    #[test]
    fn call_status_display_and_parse() {
        assert_eq!(CallStatus::Ok.to_string(), "ok");
        assert_eq!(CallStatus::from_str("error").unwrap(), CallStatus::Error);
    }

    #[test]
    fn now_millis_has_no_sub_millisecond_component() {
        use chrono::Timelike;
        let ts = now_millis();
        assert_eq!(ts.nanosecond() % 1_000_000, 0);
    }
}
