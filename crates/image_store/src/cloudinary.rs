use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use shared::domain::{UploadFile, ALLOWED_IMAGE_FORMATS};
use tracing::{debug, warn};

use crate::{sort_newest_first, ImageStore, ImageStoreError, StoreResult, StoredImage};

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct CloudinaryStore {
    http: Client,
    config: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct ResourceRecord {
    public_id: String,
    secure_url: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    bytes: u64,
    created_at: DateTime<Utc>,
}

impl From<ResourceRecord> for StoredImage {
    fn from(value: ResourceRecord) -> Self {
        Self {
            public_id: value.public_id,
            secure_url: value.secure_url,
            format: value.format,
            bytes: value.bytes,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResourceListing {
    resources: Option<Vec<ResourceRecord>>,
}

#[derive(Debug, Deserialize)]
struct DestroyResult {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            path
        )
    }

    /// Signs `params` the way the upload API expects: sorted `key=value`
    /// pairs joined by `&`, followed by the secret, hashed with SHA-256.
    fn signed_params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let signature = sign_params(&params, &self.config.api_secret);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }
}

pub(crate) fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn rejection(response: Response) -> ImageStoreError {
    let status = response.status().as_u16();
    let raw = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&raw)
        .map(|envelope| envelope.error.message)
        .unwrap_or(raw);
    ImageStoreError::Rejected { status, message }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    async fn upload(&self, folder: &str, file: &UploadFile) -> StoreResult<StoredImage> {
        let timestamp = Utc::now().timestamp().to_string();
        let params = self.signed_params(vec![
            ("allowed_formats", ALLOWED_IMAGE_FORMATS.join(",")),
            ("folder", folder.to_string()),
            ("timestamp", timestamp),
        ]);

        let mut part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        if let Some(content_type) = file.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| ImageStoreError::Rejected {
                    status: 400,
                    message: format!("invalid content type '{content_type}': {e}"),
                })?;
        }
        let mut form = Form::new().part("file", part);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .http
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            let err = rejection(response).await;
            warn!(filename = %file.filename, error = %err, "image upload rejected");
            return Err(err);
        }

        let record: ResourceRecord = response.json().await?;
        debug!(public_id = %record.public_id, "image uploaded");
        Ok(record.into())
    }

    async fn list(&self, prefix: &str, max_results: u32) -> StoreResult<Vec<StoredImage>> {
        let response = self
            .http
            .get(self.endpoint("resources/image/upload"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&[
                ("prefix", prefix.to_string()),
                ("max_results", max_results.to_string()),
                ("direction", "desc".to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let listing: ResourceListing = response.json().await?;
        let resources = listing.resources.ok_or_else(|| {
            ImageStoreError::Malformed("listing response has no resources".to_string())
        })?;
        let mut images: Vec<StoredImage> = resources.into_iter().map(Into::into).collect();
        sort_newest_first(&mut images);
        images.truncate(max_results as usize);
        Ok(images)
    }

    async fn destroy(&self, public_id: &str, invalidate: bool) -> StoreResult<()> {
        let timestamp = Utc::now().timestamp().to_string();
        let params = self.signed_params(vec![
            ("invalidate", invalidate.to_string()),
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
        ]);

        let response = self
            .http
            .post(self.endpoint("image/destroy"))
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let outcome: DestroyResult = response.json().await?;
        match outcome.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(ImageStoreError::NotFound(public_id.to_string())),
            other => Err(ImageStoreError::Malformed(format!(
                "unexpected destroy result '{other}'"
            ))),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        let response = self
            .http
            .get(self.endpoint("ping"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/cloudinary_tests.rs"]
mod tests;
