use shared::domain::Label;
use thiserror::Error;
use tracing::{error, warn};

/// Shown for any prediction failure the operator can retry.
pub const PREDICT_FAILED_MESSAGE: &str = "Prediction failed. Please try again.";
/// Shown for any feedback failure the operator can retry.
pub const FEEDBACK_FAILED_MESSAGE: &str = "Sending feedback failed. Please try again.";

/// Failures detected locally, before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the selected file must be an image (got {media_type})")]
    NotAnImage { media_type: String },
    #[error("the selected image is empty")]
    EmptyImage,
    #[error("please choose an image file first")]
    NoFileSelected,
    #[error("a request for this workflow is already in flight")]
    RequestInFlight,
    #[error("there is no prediction awaiting correction")]
    NoPredictionToCorrect,
    #[error("label {0} cannot be submitted as a correction")]
    UnsupportedLabel(Label),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("service responded with status {status}{}", detail_suffix(.detail))]
    Service { status: u16, detail: Option<String> },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_ref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ClientError::Decode(value.to_string())
        } else {
            ClientError::Transport(value)
        }
    }
}

impl ClientError {
    /// Network and server failures are retryable; a bad server url is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Service { .. } | ClientError::Decode(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(err) if err.is_timeout())
    }
}

/// Logs a failed remote call at a level matching its cause.
pub(crate) fn log_failure(endpoint: &'static str, err: &ClientError) {
    match err {
        ClientError::Transport(source) => {
            error!(endpoint, timeout = source.is_timeout(), "transport failure: {source}")
        }
        ClientError::Service { status, detail } => warn!(
            endpoint,
            status,
            detail = detail.as_deref().unwrap_or(""),
            "service returned non-success status"
        ),
        ClientError::Decode(reason) => warn!(endpoint, "malformed response body: {reason}"),
        ClientError::InvalidUrl(reason) => error!(endpoint, "invalid server url: {reason}"),
    }
}
