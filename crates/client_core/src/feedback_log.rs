use std::sync::Arc;

use tracing::info;

use crate::{
    error::log_failure,
    render::{FeedbackRow, TableBody},
    ClassifierApi,
};

pub const FEEDBACK_UNAVAILABLE_MESSAGE: &str =
    "Could not load feedback. Please check that the backend is running.";

/// Collected corrections; fetched in full on every load, never cached.
pub struct FeedbackLogViewer {
    api: Arc<dyn ClassifierApi>,
}

impl FeedbackLogViewer {
    pub fn new(api: Arc<dyn ClassifierApi>) -> Self {
        Self { api }
    }

    pub async fn load(&self) -> TableBody<FeedbackRow> {
        match self.api.fetch_feedback_log().await {
            Ok(records) => {
                info!(total_items = records.len(), "feedback log loaded");
                TableBody::Rows(records.iter().map(FeedbackRow::from).collect())
            }
            Err(err) => {
                log_failure("stats/feedback", &err);
                TableBody::Fallback(FEEDBACK_UNAVAILABLE_MESSAGE.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/feedback_log_tests.rs"]
mod tests;
