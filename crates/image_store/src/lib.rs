use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::UploadFile;
use thiserror::Error;

mod cloudinary;
mod memory;

pub use cloudinary::{CloudinaryConfig, CloudinaryStore};
pub use memory::MemoryImageStore;

/// A blob held by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub public_id: String,
    pub secure_url: String,
    pub format: String,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("image store unreachable: {0}")]
    Unreachable(String),
    #[error("image store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed image store response: {0}")]
    Malformed(String),
    #[error("image not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ImageStoreError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Unreachable(value.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, ImageStoreError>;

/// Remote image hosting: upload into a folder, list by prefix, delete by the
/// store's own identifier.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, folder: &str, file: &UploadFile) -> StoreResult<StoredImage>;

    /// Lists images whose public id starts with `prefix`, newest first.
    async fn list(&self, prefix: &str, max_results: u32) -> StoreResult<Vec<StoredImage>>;

    /// Removes an image; `invalidate` asks the store to purge cached copies.
    async fn destroy(&self, public_id: &str, invalidate: bool) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

fn sort_newest_first(images: &mut [StoredImage]) {
    images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
