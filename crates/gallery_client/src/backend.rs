use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use shared::{
    domain::{PaymentSettings, UploadBatch},
    error::ApiError,
    protocol::{
        AdminLoginRequest, AdminLoginResponse, DeleteGalleryRequest, GalleryResponse,
        SaveSettingsRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::error::GalleryError;

/// Remote side of the gallery: listing, batch upload and batch delete.
#[async_trait]
pub trait GalleryBackend: Send + Sync {
    /// Current gallery URLs, newest first. Each call must bypass caches.
    async fn list(&self) -> Result<Vec<String>, GalleryError>;
    /// Submits the whole batch in one request; all-or-nothing.
    async fn upload(&self, batch: UploadBatch) -> Result<(), GalleryError>;
    /// Deletes the given URLs and returns how many store resources went away.
    async fn delete(&self, urls: Vec<String>) -> Result<usize, GalleryError>;
}

/// [`GalleryBackend`] over the site's HTTP API.
pub struct HttpGalleryBackend {
    http: Client,
    base: Url,
    token: Option<String>,
    requests: AtomicU64,
}

impl HttpGalleryBackend {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
            token: None,
            requests: AtomicU64::new(0),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn has_session(&self) -> bool {
        self.token.is_some()
    }

    /// Exchanges the admin password for a session token kept on this client.
    pub async fn login(&mut self, password: &str) -> Result<(), GalleryError> {
        let response = self
            .http
            .post(self.endpoint("api/admin/login").map_err(GalleryError::Session)?)
            .json(&AdminLoginRequest {
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|e| GalleryError::Session(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GalleryError::Session(api_error_message(response).await));
        }
        let body: AdminLoginResponse = response
            .json()
            .await
            .map_err(|e| GalleryError::Session(e.to_string()))?;
        debug!(expires_at = %body.expires_at, "admin session established");
        self.token = Some(body.token);
        Ok(())
    }

    pub async fn save_settings(
        &self,
        upi_id: &str,
        upi_name: &str,
    ) -> Result<PaymentSettings, GalleryError> {
        let url = self
            .endpoint("api/settings")
            .map_err(GalleryError::SettingsSave)?;
        let response = self
            .authorized(self.http.post(url))
            .json(&SaveSettingsRequest {
                upi_id: upi_id.to_string(),
                upi_name: upi_name.to_string(),
            })
            .send()
            .await
            .map_err(|e| GalleryError::SettingsSave(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GalleryError::SettingsSave(
                api_error_message(response).await,
            ));
        }
        response
            .json()
            .await
            .map_err(|e| GalleryError::SettingsSave(e.to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, String> {
        self.base.join(path).map_err(|e| e.to_string())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Millisecond timestamp plus a per-client counter, so two listings in the
    /// same millisecond still differ.
    fn cache_bust_token(&self) -> String {
        let seq = self.requests.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", Utc::now().timestamp_millis())
    }
}

#[async_trait]
impl GalleryBackend for HttpGalleryBackend {
    async fn list(&self) -> Result<Vec<String>, GalleryError> {
        let url = self.endpoint("api/gallery").map_err(GalleryError::List)?;
        let response = self
            .http
            .get(url)
            .query(&[("t", self.cache_bust_token())])
            .send()
            .await
            .map_err(|e| GalleryError::List(e.to_string()))?;
        let body = read_gallery_response(response)
            .await
            .map_err(GalleryError::List)?;
        Ok(body.images.unwrap_or_default())
    }

    async fn upload(&self, batch: UploadBatch) -> Result<(), GalleryError> {
        let url = self
            .endpoint("api/gallery/upload")
            .map_err(GalleryError::Upload)?;
        let mut form = Form::new();
        for file in batch.into_files() {
            let mut part = Part::bytes(file.bytes).file_name(file.filename);
            if let Some(content_type) = file.content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| GalleryError::Upload(e.to_string()))?;
            }
            form = form.part("files", part);
        }

        let response = self
            .authorized(self.http.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| GalleryError::Upload(e.to_string()))?;
        read_gallery_response(response)
            .await
            .map_err(GalleryError::Upload)?;
        Ok(())
    }

    async fn delete(&self, urls: Vec<String>) -> Result<usize, GalleryError> {
        let url = self
            .endpoint("api/gallery/delete")
            .map_err(GalleryError::Delete)?;
        let requested = urls.len();
        let response = self
            .authorized(self.http.post(url))
            .json(&DeleteGalleryRequest { images: urls })
            .send()
            .await
            .map_err(|e| GalleryError::Delete(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GalleryError::DeleteNotFound);
        }
        let body = read_gallery_response(response)
            .await
            .map_err(GalleryError::Delete)?;
        Ok(body.deleted.unwrap_or(requested))
    }
}

/// Accepts only a 2xx response whose body says `success: true`.
async fn read_gallery_response(response: Response) -> Result<GalleryResponse, String> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    let body = serde_json::from_slice::<GalleryResponse>(&bytes).ok();
    match body {
        Some(body) if status.is_success() && body.success => Ok(body),
        Some(body) => Err(body
            .error
            .unwrap_or_else(|| format!("server responded with {status}"))),
        None => Err(format!("server responded with {status}")),
    }
}

async fn api_error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) => error.message,
        Err(_) => format!("server responded with {status}"),
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
