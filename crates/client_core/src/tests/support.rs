use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shared::{
    domain::{Label, RequestId},
    protocol::{FeedbackRecord, LogRecord, PredictResponse, PredictionCounts},
};
use tokio::sync::oneshot;

use crate::{ClassifierApi, ClientError, ImageFile, ImageUpload};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Predict {
        filename: String,
    },
    Feedback {
        filename: String,
        label: Label,
        log_id: RequestId,
    },
    Logs,
    FeedbackLog,
    Stats,
}

#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    Status(u16),
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Status(status) => Err(ClientError::Service {
                status,
                detail: None,
            }),
        }
    }
}

struct Gate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Scripted `ClassifierApi`. Unscripted calls succeed with empty data, except
/// `predict`, which answers 500.
#[derive(Default)]
pub(crate) struct FakeApi {
    predict: Mutex<VecDeque<Reply<PredictResponse>>>,
    feedback: Mutex<VecDeque<Reply<()>>>,
    logs: Mutex<Option<Reply<Vec<LogRecord>>>>,
    feedback_log: Mutex<Option<Reply<Vec<FeedbackRecord>>>>,
    stats: Mutex<Option<Reply<PredictionCounts>>>,
    predict_gate: Mutex<Option<Gate>>,
    feedback_gate: Mutex<Option<Gate>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_predict(&self, reply: Reply<PredictResponse>) {
        self.predict.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn push_feedback(&self, reply: Reply<()>) {
        self.feedback.lock().expect("lock").push_back(reply);
    }

    pub(crate) fn set_logs(&self, reply: Reply<Vec<LogRecord>>) {
        *self.logs.lock().expect("lock") = Some(reply);
    }

    pub(crate) fn set_feedback_log(&self, reply: Reply<Vec<FeedbackRecord>>) {
        *self.feedback_log.lock().expect("lock") = Some(reply);
    }

    pub(crate) fn set_stats(&self, reply: Reply<PredictionCounts>) {
        *self.stats.lock().expect("lock") = Some(reply);
    }

    /// Holds the next `predict` call until the returned sender fires. The
    /// receiver resolves once the call has started.
    pub(crate) fn gate_predict(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        install_gate(&self.predict_gate)
    }

    /// Same as [`FakeApi::gate_predict`] for the next `send_feedback` call.
    pub(crate) fn gate_feedback(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        install_gate(&self.feedback_gate)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }
}

fn install_gate(slot: &Mutex<Option<Gate>>) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    *slot.lock().expect("lock") = Some(Gate {
        entered: entered_tx,
        release: release_rx,
    });
    (entered_rx, release_tx)
}

async fn pass_gate(slot: &Mutex<Option<Gate>>) {
    let gate = slot.lock().expect("lock").take();
    if let Some(gate) = gate {
        let _ = gate.entered.send(());
        let _ = gate.release.await;
    }
}

#[async_trait]
impl ClassifierApi for FakeApi {
    async fn predict(&self, image: &ImageUpload) -> Result<PredictResponse, ClientError> {
        self.record(Call::Predict {
            filename: image.filename.clone(),
        });
        pass_gate(&self.predict_gate).await;
        self.predict
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Reply::Status(500))
            .into_result()
    }

    async fn send_feedback(
        &self,
        image: &ImageUpload,
        label: &Label,
        log_id: &RequestId,
    ) -> Result<(), ClientError> {
        self.record(Call::Feedback {
            filename: image.filename.clone(),
            label: label.clone(),
            log_id: log_id.clone(),
        });
        pass_gate(&self.feedback_gate).await;
        self.feedback
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Reply::Ok(()))
            .into_result()
    }

    async fn fetch_logs(&self) -> Result<Vec<LogRecord>, ClientError> {
        self.record(Call::Logs);
        self.logs
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or(Reply::Ok(Vec::new()))
            .into_result()
    }

    async fn fetch_feedback_log(&self) -> Result<Vec<FeedbackRecord>, ClientError> {
        self.record(Call::FeedbackLog);
        self.feedback_log
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or(Reply::Ok(Vec::new()))
            .into_result()
    }

    async fn fetch_prediction_stats(&self) -> Result<PredictionCounts, ClientError> {
        self.record(Call::Stats);
        self.stats
            .lock()
            .expect("lock")
            .clone()
            .unwrap_or(Reply::Ok(PredictionCounts::new()))
            .into_result()
    }
}

pub(crate) fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", b"\x89PNG\r\n\x1a\nfake-pixels".to_vec())
}

pub(crate) fn prediction(log_id: Option<i64>, label: Label, confidence: f64) -> PredictResponse {
    PredictResponse {
        log_id: log_id.map(|id| RequestId::new(id.to_string())),
        prediction: label,
        confidence,
    }
}

pub(crate) fn log_record(index: usize) -> LogRecord {
    LogRecord {
        id: Some(index as i64),
        ip_address: format!("10.0.0.{index}"),
        request_time: "Sat, 18 Oct 2026 10:00:00 GMT".to_string(),
        filename: Some(format!("lesion-{index}.png")),
        prediction: Some(Label::Bcc),
        confidence: Some(0.5),
        is_valid_case: Some(true),
    }
}

pub(crate) fn log_records(count: usize) -> Vec<LogRecord> {
    (0..count).map(log_record).collect()
}
