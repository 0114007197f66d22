use serde::{Deserialize, Serialize};

/// Error body the backend attaches to non-2xx responses.
///
/// Only used for diagnostics; callers never branch on its content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerErrorBody {
    pub error: String,
}

impl ServerErrorBody {
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}
