use std::sync::Arc;

use tracing::info;

use crate::{
    error::log_failure,
    render::{StatsRow, TableBody},
    ClassifierApi,
};

pub const STATS_UNAVAILABLE_MESSAGE: &str =
    "Could not load prediction statistics. Please check that the backend is running.";

/// Per-label counts of valid predictions.
pub struct PredictionStatsViewer {
    api: Arc<dyn ClassifierApi>,
}

impl PredictionStatsViewer {
    pub fn new(api: Arc<dyn ClassifierApi>) -> Self {
        Self { api }
    }

    /// Rows come out in label order: BCC, SCC, Mel, then any other label.
    pub async fn load(&self) -> TableBody<StatsRow> {
        match self.api.fetch_prediction_stats().await {
            Ok(counts) => {
                info!(labels = counts.len(), "prediction stats loaded");
                TableBody::Rows(
                    counts
                        .into_iter()
                        .map(|(label, count)| StatsRow {
                            label: label.to_string(),
                            count,
                        })
                        .collect(),
                )
            }
            Err(err) => {
                log_failure("stats/predictions", &err);
                TableBody::Fallback(STATS_UNAVAILABLE_MESSAGE.to_string())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/stats_tests.rs"]
mod tests;
