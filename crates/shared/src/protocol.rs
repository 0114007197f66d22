use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Label, RequestId};

/// Body of `POST /api/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    /// `null` when the backend failed to persist the request log.
    #[serde(default)]
    pub log_id: Option<RequestId>,
    pub prediction: Label,
    pub confidence: f64,
}

/// One row of `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub request_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Label>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid_case: Option<bool>,
}

/// One row of `GET /api/stats/feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,
    /// Base64 image bytes without a data-URI prefix.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image_data: String,
    pub label: Label,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

/// NUMERIC columns may be serialized as strings. Text that does not parse is
/// treated as absent.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<RawNumber>::deserialize(deserializer)? {
        Some(RawNumber::Number(value)) => Some(value),
        Some(RawNumber::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

/// Body of `GET /api/stats/predictions`.
pub type PredictionCounts = BTreeMap<Label, u64>;

pub mod multipart_fields {
    pub const IMAGE: &str = "image";
    pub const LABEL: &str = "label";
    pub const LOG_ID: &str = "log_id";
}

pub mod paths {
    pub const PREDICT: &str = "/api/predict";
    pub const FEEDBACK: &str = "/api/feedback";
    pub const LOGS: &str = "/api/logs";
    pub const FEEDBACK_LOG: &str = "/api/stats/feedback";
    pub const PREDICTION_STATS: &str = "/api/stats/predictions";
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
