use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    domain::{Label, RequestId},
    error::ServerErrorBody,
    protocol::{
        multipart_fields, paths, FeedbackRecord, LogRecord, PredictResponse, PredictionCounts,
    },
};
use tracing::{debug, info};
use url::Url;

pub mod error;
pub mod feedback;
pub mod feedback_log;
pub mod pagination;
pub mod render;
pub mod stats;
pub mod upload;
pub mod workflow;

pub use error::{ClientError, ValidationError};
pub use feedback::FeedbackSubmitter;
pub use feedback_log::FeedbackLogViewer;
pub use pagination::{LogPageView, LogPaginator, Page, PageAction, PageControls, PAGE_SIZE};
pub use stats::PredictionStatsViewer;
pub use upload::{
    ImageFile, ImageId, ImageUpload, PreviewHandle, PreviewRegistry, ResetSignal, SelectedImage,
    UploadController,
};
pub use workflow::{
    CorrectionOutcome, MessageToken, PredictionResult, PredictionWorkflow, ReviewSession,
    SubmitOutcome, WorkflowPhase, WorkflowView, CONFIRMATION_TTL,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote classification, feedback and log services.
#[async_trait]
pub trait ClassifierApi: Send + Sync {
    async fn predict(&self, image: &ImageUpload) -> Result<PredictResponse, ClientError>;
    async fn send_feedback(
        &self,
        image: &ImageUpload,
        label: &Label,
        log_id: &RequestId,
    ) -> Result<(), ClientError>;
    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, ClientError>;
    async fn fetch_feedback_log(&self) -> Result<Vec<FeedbackRecord>, ClientError>;
    async fn fetch_prediction_stats(&self) -> Result<PredictionCounts, ClientError>;
}

/// `ClassifierApi` over HTTP.
pub struct HttpClassifierClient {
    http: Client,
    server_url: String,
}

impl HttpClassifierClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            server_url: normalize_server_url(server_url)?,
        })
    }

    pub fn into_shared(self) -> Arc<dyn ClassifierApi> {
        Arc::new(self)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &'static str,
    ) -> Result<T, ClientError> {
        let response = self.http.get(self.endpoint(path)).send().await?;
        let body = ensure_success(response).await?.json().await?;
        debug!(endpoint = path, "fetched");
        Ok(body)
    }
}

/// Strips trailing slashes and rejects anything that is not http(s).
pub fn normalize_server_url(raw: &str) -> Result<String, ClientError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|err| ClientError::InvalidUrl(format!("{trimmed}: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ClientError::InvalidUrl(format!(
            "{trimmed}: unsupported scheme {}",
            parsed.scheme()
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = ServerErrorBody::parse(&body).map(|body| body.error);
    Err(ClientError::Service {
        status: status.as_u16(),
        detail,
    })
}

fn image_part(image: &ImageUpload) -> Result<Part, ClientError> {
    Part::bytes(image.bytes.to_vec())
        .file_name(image.filename.clone())
        .mime_str(&image.media_type)
        .map_err(ClientError::Transport)
}

#[async_trait]
impl ClassifierApi for HttpClassifierClient {
    async fn predict(&self, image: &ImageUpload) -> Result<PredictResponse, ClientError> {
        let form = Form::new().part(multipart_fields::IMAGE, image_part(image)?);
        let response = self
            .http
            .post(self.endpoint(paths::PREDICT))
            .multipart(form)
            .send()
            .await?;
        let body: PredictResponse = ensure_success(response).await?.json().await?;
        info!(
            prediction = %body.prediction,
            confidence = body.confidence,
            "classification received"
        );
        Ok(body)
    }

    async fn send_feedback(
        &self,
        image: &ImageUpload,
        label: &Label,
        log_id: &RequestId,
    ) -> Result<(), ClientError> {
        let form = Form::new()
            .part(multipart_fields::IMAGE, image_part(image)?)
            .text(multipart_fields::LABEL, label.wire_name().to_string())
            .text(multipart_fields::LOG_ID, log_id.to_string());
        let response = self
            .http
            .post(self.endpoint(paths::FEEDBACK))
            .multipart(form)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, ClientError> {
        self.get_json(paths::LOGS).await
    }

    async fn fetch_feedback_log(&self) -> Result<Vec<FeedbackRecord>, ClientError> {
        self.get_json(paths::FEEDBACK_LOG).await
    }

    async fn fetch_prediction_stats(&self) -> Result<PredictionCounts, ClientError> {
        self.get_json(paths::PREDICTION_STATS).await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
