use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::domain::{allowed_image_format, UploadFile};
use tokio::sync::Mutex;

use crate::{ImageStore, ImageStoreError, StoreResult, StoredImage};

const EPOCH_SECONDS: i64 = 1_700_000_000;

/// In-process image store with deterministic ordering and failure switches.
pub struct MemoryImageStore {
    base_url: String,
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_seq: i64,
    images: Vec<StoredImage>,
    unreachable: bool,
    failing_destroys: HashSet<String>,
    destroyed: Vec<String>,
    invalidated: Vec<String>,
}

impl Default for MemoryImageStore {
    fn default() -> Self {
        Self::new("https://images.local/demo")
    }
}

impl MemoryImageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            inner: Mutex::new(MemoryState::default()),
        }
    }

    /// Simulates a store outage for every call until switched back.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().await.unreachable = unreachable;
    }

    /// Makes destroy calls for `public_id` fail with a server error.
    pub async fn fail_destroy(&self, public_id: impl Into<String>) {
        self.inner
            .lock()
            .await
            .failing_destroys
            .insert(public_id.into());
    }

    /// Public ids removed so far, in call order.
    pub async fn destroyed(&self) -> Vec<String> {
        self.inner.lock().await.destroyed.clone()
    }

    /// Public ids whose removal asked for cache invalidation.
    pub async fn invalidated(&self) -> Vec<String> {
        self.inner.lock().await.invalidated.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, folder: &str, file: &UploadFile) -> StoreResult<StoredImage> {
        let mut state = self.inner.lock().await;
        if state.unreachable {
            return Err(ImageStoreError::Unreachable("memory store offline".into()));
        }

        let format = allowed_image_format(&file.filename, file.content_type.as_deref())
            .ok_or_else(|| ImageStoreError::Rejected {
                status: 400,
                message: format!("Image file format not allowed: {}", file.filename),
            })?;

        state.next_seq += 1;
        let seq = state.next_seq;
        let stem = file
            .filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&file.filename);
        let public_id = format!("{folder}/{stem}_{seq}");
        let image = StoredImage {
            secure_url: format!("{}/image/upload/v{seq}/{public_id}.{format}", self.base_url),
            public_id,
            format: format.to_string(),
            bytes: file.bytes.len() as u64,
            created_at: DateTime::<Utc>::from_timestamp(EPOCH_SECONDS + seq, 0)
                .unwrap_or_default(),
        };
        state.images.push(image.clone());
        Ok(image)
    }

    async fn list(&self, prefix: &str, max_results: u32) -> StoreResult<Vec<StoredImage>> {
        let state = self.inner.lock().await;
        if state.unreachable {
            return Err(ImageStoreError::Unreachable("memory store offline".into()));
        }

        let mut images: Vec<StoredImage> = state
            .images
            .iter()
            .filter(|image| image.public_id.starts_with(prefix))
            .cloned()
            .collect();
        crate::sort_newest_first(&mut images);
        images.truncate(max_results as usize);
        Ok(images)
    }

    async fn destroy(&self, public_id: &str, invalidate: bool) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        if state.unreachable {
            return Err(ImageStoreError::Unreachable("memory store offline".into()));
        }
        if state.failing_destroys.contains(public_id) {
            return Err(ImageStoreError::Rejected {
                status: 500,
                message: format!("destroy failed for {public_id}"),
            });
        }

        let before = state.images.len();
        state.images.retain(|image| image.public_id != public_id);
        if state.images.len() == before {
            return Err(ImageStoreError::NotFound(public_id.to_string()));
        }
        state.destroyed.push(public_id.to_string());
        if invalidate {
            state.invalidated.push(public_id.to_string());
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.inner.lock().await.unreachable {
            return Err(ImageStoreError::Unreachable("memory store offline".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
