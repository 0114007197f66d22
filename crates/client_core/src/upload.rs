//! Image selection and preview ownership.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(pub u64);

/// A file offered for selection, before validation.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self {
            filename,
            media_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

/// Multipart payload handed to the classifier service.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Default)]
struct PreviewTable {
    next_id: u64,
    live: HashMap<PreviewId, Arc<str>>,
}

/// Issues data-URI previews and tracks which ones are still alive.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<PreviewTable>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, media_type: &str, bytes: &[u8]) -> PreviewHandle {
        let uri: Arc<str> = format!("data:{media_type};base64,{}", STANDARD.encode(bytes)).into();
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.next_id += 1;
        let id = PreviewId(table.next_id);
        table.live.insert(id, Arc::clone(&uri));
        debug!(preview_id = id.0, "preview acquired");
        PreviewHandle {
            id,
            uri,
            registry: self.clone(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .len()
    }

    pub fn is_live(&self, id: PreviewId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .contains_key(&id)
    }

    fn release(&self, id: PreviewId) {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .remove(&id);
        if removed.is_some() {
            debug!(preview_id = id.0, "preview released");
        }
    }
}

/// Live preview reference; released when dropped.
pub struct PreviewHandle {
    id: PreviewId,
    uri: Arc<str>,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> PreviewId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn shared_uri(&self) -> Arc<str> {
        Arc::clone(&self.uri)
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle").field("id", &self.id).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

#[derive(Debug)]
pub struct SelectedImage {
    pub id: ImageId,
    pub filename: String,
    pub media_type: String,
    bytes: Arc<[u8]>,
    preview: PreviewHandle,
}

impl SelectedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn upload(&self) -> ImageUpload {
        ImageUpload {
            filename: self.filename.clone(),
            media_type: self.media_type.clone(),
            bytes: Arc::clone(&self.bytes),
        }
    }
}

/// Emitted on every accepted selection; the workflow clears dependent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSignal {
    pub image_id: ImageId,
}

pub struct UploadController {
    previews: PreviewRegistry,
    current: Option<SelectedImage>,
    next_id: u64,
}

impl UploadController {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self {
            previews,
            current: None,
            next_id: 0,
        }
    }

    pub fn select(&mut self, file: ImageFile) -> Result<ResetSignal, ValidationError> {
        if !file.is_image() {
            warn!(
                filename = %file.filename,
                media_type = %file.media_type,
                "rejected non-image selection"
            );
            return Err(ValidationError::NotAnImage {
                media_type: file.media_type,
            });
        }
        if file.bytes.is_empty() {
            warn!(filename = %file.filename, "rejected empty image selection");
            return Err(ValidationError::EmptyImage);
        }

        // Old preview goes before the new one is created.
        self.current = None;

        let preview = self.previews.acquire(&file.media_type, &file.bytes);
        self.next_id += 1;
        let id = ImageId(self.next_id);
        info!(
            image_id = id.0,
            filename = %file.filename,
            size_bytes = file.bytes.len(),
            "image selected"
        );
        self.current = Some(SelectedImage {
            id,
            filename: file.filename,
            media_type: file.media_type,
            bytes: file.bytes.into(),
            preview,
        });
        Ok(ResetSignal { image_id: id })
    }

    /// Drops the current image and its preview. Returns whether one was held.
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }

    pub fn current(&self) -> Option<&SelectedImage> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<ImageId> {
        self.current.as_ref().map(|image| image.id)
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
