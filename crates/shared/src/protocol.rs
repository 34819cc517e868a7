use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorCode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryListQuery {
    /// Cache-bust token; its value is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Shape shared by the gallery list, upload and delete routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Number of store resources removed by a delete batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl GalleryResponse {
    pub fn listing(images: Vec<String>) -> Self {
        Self {
            success: true,
            count: Some(images.len()),
            images: Some(images),
            deleted: None,
            error: None,
            code: None,
        }
    }

    pub fn deletion(deleted: usize, images: Vec<String>) -> Self {
        Self {
            deleted: Some(deleted),
            ..Self::listing(images)
        }
    }

    pub fn failed(error: &ApiError) -> Self {
        Self {
            success: false,
            images: None,
            count: None,
            deleted: None,
            error: Some(error.message.clone()),
            code: Some(error.code),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteGalleryRequest {
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSettingsRequest {
    #[serde(default, alias = "upiId")]
    pub upi_id: String,
    #[serde(default, alias = "upiName")]
    pub upi_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrUploadResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmission {
    #[serde(default, alias = "fullName")]
    pub full_name: String,
    #[serde(default, alias = "phoneNumber")]
    pub phone_number: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmitted {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub image_store: ComponentHealth,
    pub database: ComponentHealth,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.image_store.ok && self.database.ok
    }
}
