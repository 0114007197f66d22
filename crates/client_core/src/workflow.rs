//! Prediction review workflow: selection, submission, result and correction.
//!
//! [`PredictionWorkflow`] is a synchronous state machine. Network calls are made
//! by [`ReviewSession`], which releases the workflow lock while a request is in
//! flight so a new selection can land before the response does. Completions are
//! matched against the selected [`ImageId`] and dropped when it has changed.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Confidence, Label, RequestId},
    protocol::PredictResponse,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    error::{
        log_failure, ClientError, ValidationError, FEEDBACK_FAILED_MESSAGE,
        PREDICT_FAILED_MESSAGE,
    },
    feedback::{CorrectionTicket, FeedbackSubmitter},
    upload::{ImageFile, ImageId, ImageUpload, PreviewRegistry, ResetSignal, UploadController},
    ClassifierApi,
};

/// How long a confirmation stays visible unless superseded.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    HasFile,
    Submitting,
    Resulted,
    FeedbackOffered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Absent when the backend could not log the request; such a result
    /// cannot be corrected.
    pub request_id: Option<RequestId>,
    pub label: Label,
    pub confidence: Confidence,
}

impl TryFrom<PredictResponse> for PredictionResult {
    type Error = ClientError;

    fn try_from(value: PredictResponse) -> Result<Self, Self::Error> {
        let confidence = Confidence::new(value.confidence).ok_or_else(|| {
            ClientError::Decode(format!("confidence {} outside [0, 1]", value.confidence))
        })?;
        Ok(Self {
            request_id: value.log_id,
            label: value.prediction,
            confidence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub token: MessageToken,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SubmitTicket {
    pub image_id: ImageId,
    pub image: ImageUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Resulted { feedback_offered: bool },
    Failed,
    /// The image changed while the request was in flight.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    Confirmed(MessageToken),
    Failed,
    Discarded,
}

/// Snapshot for rendering.
#[derive(Debug, Clone)]
pub struct WorkflowView {
    pub phase: WorkflowPhase,
    pub can_submit: bool,
    pub filename: Option<String>,
    pub preview_uri: Option<Arc<str>>,
    pub result: Option<PredictionResult>,
    pub feedback_offered: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

pub struct PredictionWorkflow {
    upload: UploadController,
    phase: WorkflowPhase,
    offer_feedback: bool,
    predict_in_flight: Option<ImageId>,
    correction_in_flight: Option<ImageId>,
    result: Option<(ImageId, PredictionResult)>,
    error: Option<String>,
    message: Option<Notice>,
    message_seq: u64,
}

impl PredictionWorkflow {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            upload: UploadController::new(previews),
            phase: WorkflowPhase::Idle,
            offer_feedback: true,
            predict_in_flight: None,
            correction_in_flight: None,
            result: None,
            error: None,
            message: None,
            message_seq: 0,
        }
    }

    /// With `false`, results stay in `Resulted` and are never offered for correction.
    pub fn with_feedback_offer(mut self, offer_feedback: bool) -> Self {
        self.offer_feedback = offer_feedback;
        self
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn can_submit(&self) -> bool {
        self.upload.current().is_some() && self.predict_in_flight.is_none()
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        self.result.as_ref().map(|(_, result)| result)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn message(&self) -> Option<&Notice> {
        self.message.as_ref()
    }

    pub fn upload(&self) -> &UploadController {
        &self.upload
    }

    /// Invalid files leave the current selection, result and preview untouched.
    pub fn select_file(&mut self, file: ImageFile) -> Result<ImageId, ValidationError> {
        match self.upload.select(file) {
            Ok(signal) => {
                self.apply_reset(signal);
                Ok(signal.image_id)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn apply_reset(&mut self, signal: ResetSignal) {
        if let Some(pending) = self.predict_in_flight {
            info!(
                superseded_image_id = pending.0,
                image_id = signal.image_id.0,
                "selection supersedes in-flight prediction"
            );
        }
        self.result = None;
        self.error = None;
        self.message = None;
        self.phase = WorkflowPhase::HasFile;
    }

    pub fn begin_submit(&mut self) -> Result<SubmitTicket, ValidationError> {
        let Some(image) = self.upload.current() else {
            let err = ValidationError::NoFileSelected;
            self.error = Some(err.to_string());
            return Err(err);
        };
        if self.predict_in_flight.is_some() {
            return Err(ValidationError::RequestInFlight);
        }

        let ticket = SubmitTicket {
            image_id: image.id,
            image: image.upload(),
        };
        self.predict_in_flight = Some(ticket.image_id);
        self.phase = WorkflowPhase::Submitting;
        self.error = None;
        self.message = None;
        info!(image_id = ticket.image_id.0, "submitting image for classification");
        Ok(ticket)
    }

    pub fn complete_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<PredictResponse, ClientError>,
    ) -> SubmitOutcome {
        let was_in_flight = self.predict_in_flight == Some(ticket.image_id);
        if was_in_flight {
            self.predict_in_flight = None;
        }
        if !was_in_flight || self.upload.current_id() != Some(ticket.image_id) {
            warn!(image_id = ticket.image_id.0, "discarding stale prediction response");
            return SubmitOutcome::Discarded;
        }

        match outcome.and_then(PredictionResult::try_from) {
            Ok(result) => {
                let feedback_offered = self.offer_feedback && result.request_id.is_some();
                info!(
                    image_id = ticket.image_id.0,
                    label = %result.label,
                    confidence = result.confidence.value(),
                    feedback_offered,
                    "prediction resulted"
                );
                self.result = Some((ticket.image_id, result));
                self.phase = if feedback_offered {
                    WorkflowPhase::FeedbackOffered
                } else {
                    WorkflowPhase::Resulted
                };
                SubmitOutcome::Resulted { feedback_offered }
            }
            Err(err) => {
                log_failure("predict", &err);
                self.error = Some(PREDICT_FAILED_MESSAGE.to_string());
                self.phase = WorkflowPhase::HasFile;
                SubmitOutcome::Failed
            }
        }
    }

    /// Starts a correction of the current result. Rejected unless the result
    /// on offer belongs to the image that is still selected.
    pub fn correct(&mut self, label: Label) -> Result<CorrectionTicket, ValidationError> {
        match self.check_correction(label) {
            Ok(ticket) => {
                self.correction_in_flight = Some(ticket.image_id);
                self.error = None;
                Ok(ticket)
            }
            Err(err) => {
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn check_correction(&self, label: Label) -> Result<CorrectionTicket, ValidationError> {
        if !label.is_correctable() {
            return Err(ValidationError::UnsupportedLabel(label));
        }
        if self.phase != WorkflowPhase::FeedbackOffered {
            return Err(ValidationError::NoPredictionToCorrect);
        }
        let Some(image) = self.upload.current() else {
            return Err(ValidationError::NoFileSelected);
        };
        let request_id = match &self.result {
            Some((bound, result)) if *bound == image.id => result.request_id.clone(),
            _ => None,
        };
        let Some(request_id) = request_id else {
            return Err(ValidationError::NoPredictionToCorrect);
        };
        // A stale correction for a replaced image does not block this one.
        if self.correction_in_flight == Some(image.id) {
            return Err(ValidationError::RequestInFlight);
        }

        Ok(CorrectionTicket {
            image_id: image.id,
            request_id,
            label,
            image: image.upload(),
        })
    }

    pub fn complete_correction(
        &mut self,
        ticket: CorrectionTicket,
        outcome: Result<(), ClientError>,
    ) -> CorrectionOutcome {
        if self.correction_in_flight == Some(ticket.image_id) {
            self.correction_in_flight = None;
        }
        let still_bound = matches!(
            &self.result,
            Some((bound, result))
                if *bound == ticket.image_id && result.request_id.as_ref() == Some(&ticket.request_id)
        );
        if !still_bound || self.upload.current_id() != Some(ticket.image_id) {
            warn!(
                image_id = ticket.image_id.0,
                log_id = %ticket.request_id,
                "discarding stale correction response"
            );
            return CorrectionOutcome::Discarded;
        }

        match outcome {
            Ok(()) => {
                if self.phase == WorkflowPhase::FeedbackOffered {
                    self.phase = WorkflowPhase::Resulted;
                }
                let token = self.show_message(format!(
                    "Thank you! Feedback \"{}\" was submitted.",
                    ticket.label
                ));
                CorrectionOutcome::Confirmed(token)
            }
            Err(_) => {
                self.error = Some(FEEDBACK_FAILED_MESSAGE.to_string());
                CorrectionOutcome::Failed
            }
        }
    }

    /// Clears a prediction whose task ended without delivering a response.
    pub fn abandon_submit(&mut self, image_id: ImageId) -> SubmitOutcome {
        if self.predict_in_flight != Some(image_id) {
            return SubmitOutcome::Discarded;
        }
        self.predict_in_flight = None;
        if self.upload.current_id() != Some(image_id) {
            return SubmitOutcome::Discarded;
        }
        self.error = Some(PREDICT_FAILED_MESSAGE.to_string());
        self.phase = WorkflowPhase::HasFile;
        SubmitOutcome::Failed
    }

    pub fn abandon_correction(&mut self, image_id: ImageId) -> CorrectionOutcome {
        if self.correction_in_flight != Some(image_id) {
            return CorrectionOutcome::Discarded;
        }
        self.correction_in_flight = None;
        if self.upload.current_id() != Some(image_id) {
            return CorrectionOutcome::Discarded;
        }
        self.error = Some(FEEDBACK_FAILED_MESSAGE.to_string());
        CorrectionOutcome::Failed
    }

    /// Replaces any current message.
    pub fn show_message(&mut self, text: impl Into<String>) -> MessageToken {
        self.message_seq += 1;
        let token = MessageToken(self.message_seq);
        self.message = Some(Notice {
            token,
            text: text.into(),
        });
        token
    }

    /// Clears the message only if `token` still identifies it.
    pub fn expire_message(&mut self, token: MessageToken) -> bool {
        if self.message.as_ref().map(|notice| notice.token) == Some(token) {
            self.message = None;
            debug!("confirmation message expired");
            true
        } else {
            false
        }
    }

    /// Releases the selected image and returns to `Idle`.
    pub fn teardown(&mut self) {
        self.upload.clear();
        self.result = None;
        self.error = None;
        self.message = None;
        self.phase = WorkflowPhase::Idle;
    }

    pub fn view(&self) -> WorkflowView {
        let image = self.upload.current();
        WorkflowView {
            phase: self.phase,
            can_submit: self.can_submit(),
            filename: image.map(|image| image.filename.clone()),
            preview_uri: image.map(|image| image.preview().shared_uri()),
            result: self.result().cloned(),
            feedback_offered: self.phase == WorkflowPhase::FeedbackOffered,
            error: self.error.clone(),
            message: self.message.as_ref().map(|notice| notice.text.clone()),
        }
    }
}

/// Drives a [`PredictionWorkflow`] against the remote services.
pub struct ReviewSession {
    api: Arc<dyn ClassifierApi>,
    submitter: FeedbackSubmitter,
    workflow: Arc<Mutex<PredictionWorkflow>>,
    confirmation_ttl: Duration,
}

impl ReviewSession {
    pub fn new(api: Arc<dyn ClassifierApi>, workflow: PredictionWorkflow) -> Self {
        Self {
            submitter: FeedbackSubmitter::new(Arc::clone(&api)),
            api,
            workflow: Arc::new(Mutex::new(workflow)),
            confirmation_ttl: CONFIRMATION_TTL,
        }
    }

    pub fn with_confirmation_ttl(mut self, ttl: Duration) -> Self {
        self.confirmation_ttl = ttl;
        self
    }

    pub fn confirmation_ttl(&self) -> Duration {
        self.confirmation_ttl
    }

    pub async fn select(&self, file: ImageFile) -> Result<ImageId, ValidationError> {
        self.workflow.lock().await.select_file(file)
    }

    /// The request runs on its own task, so its completion reaches the
    /// workflow even when the returned future is dropped.
    pub async fn submit(&self) -> Result<SubmitOutcome, ValidationError> {
        let ticket = self.workflow.lock().await.begin_submit()?;
        let image_id = ticket.image_id;
        let api = Arc::clone(&self.api);
        let workflow = Arc::clone(&self.workflow);
        let task = tokio::spawn(async move {
            let outcome = api.predict(&ticket.image).await;
            let result = workflow.lock().await.complete_submit(ticket, outcome);
            result
        });
        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(image_id = image_id.0, "prediction task ended early: {err}");
                Ok(self.workflow.lock().await.abandon_submit(image_id))
            }
        }
    }

    /// Runs on its own task like [`ReviewSession::submit`]. On success the
    /// confirmation is scheduled to clear after the configured TTL.
    pub async fn correct(&self, label: Label) -> Result<CorrectionOutcome, ValidationError> {
        let ticket = self.workflow.lock().await.correct(label)?;
        let image_id = ticket.image_id;
        let submitter = self.submitter.clone();
        let workflow = Arc::clone(&self.workflow);
        let ttl = self.confirmation_ttl;
        let task = tokio::spawn(async move {
            let outcome = submitter.submit(&ticket).await;
            let result = workflow.lock().await.complete_correction(ticket, outcome);
            if let CorrectionOutcome::Confirmed(token) = result {
                spawn_message_expiry(workflow, ttl, token);
            }
            result
        });
        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!(image_id = image_id.0, "correction task ended early: {err}");
                Ok(self.workflow.lock().await.abandon_correction(image_id))
            }
        }
    }

    pub fn schedule_message_expiry(&self, token: MessageToken) -> JoinHandle<bool> {
        spawn_message_expiry(Arc::clone(&self.workflow), self.confirmation_ttl, token)
    }

    pub async fn show_message(&self, text: impl Into<String>) -> MessageToken {
        let token = self.workflow.lock().await.show_message(text);
        self.schedule_message_expiry(token);
        token
    }

    pub async fn view(&self) -> WorkflowView {
        self.workflow.lock().await.view()
    }

    pub async fn teardown(&self) {
        self.workflow.lock().await.teardown();
    }
}

fn spawn_message_expiry(
    workflow: Arc<Mutex<PredictionWorkflow>>,
    ttl: Duration,
    token: MessageToken,
) -> JoinHandle<bool> {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        let expired = workflow.lock().await.expire_message(token);
        expired
    })
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
