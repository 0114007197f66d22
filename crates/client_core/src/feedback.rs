use std::sync::Arc;

use shared::domain::{Label, RequestId};
use tracing::info;

use crate::{
    error::{log_failure, ClientError},
    upload::{ImageId, ImageUpload},
    ClassifierApi,
};

/// A correction bound to the image and request it was issued for.
#[derive(Debug, Clone)]
pub struct CorrectionTicket {
    pub image_id: ImageId,
    pub request_id: RequestId,
    pub label: Label,
    pub image: ImageUpload,
}

/// Sends corrections to the feedback service.
#[derive(Clone)]
pub struct FeedbackSubmitter {
    api: Arc<dyn ClassifierApi>,
}

impl FeedbackSubmitter {
    pub fn new(api: Arc<dyn ClassifierApi>) -> Self {
        Self { api }
    }

    pub async fn submit(&self, ticket: &CorrectionTicket) -> Result<(), ClientError> {
        info!(
            image_id = ticket.image_id.0,
            log_id = %ticket.request_id,
            label = %ticket.label,
            "submitting correction"
        );
        let result = self
            .api
            .send_feedback(&ticket.image, &ticket.label, &ticket.request_id)
            .await;
        match &result {
            Ok(()) => info!(log_id = %ticket.request_id, "correction stored"),
            Err(err) => log_failure("feedback", err),
        }
        result
    }
}
