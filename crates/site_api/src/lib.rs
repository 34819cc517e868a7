use std::sync::Arc;

use image_store::{ImageStore, ImageStoreError};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{ComponentHealth, HealthReport},
};
use storage::Storage;

mod contact;
mod gallery;
mod settings;

pub use contact::{delete_query, list_queries, submit_contact, MAX_CONTACT_FIELD_BYTES};
pub use gallery::{delete_gallery, list_gallery, upload_gallery, DeleteSummary};
pub use settings::{get_settings, remove_qr, save_settings, upload_qr};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub images: Arc<dyn ImageStore>,
}

/// Pings the image store and the database independently.
pub async fn store_health(ctx: &ApiContext) -> HealthReport {
    let image_store = match ctx.images.ping().await {
        Ok(()) => ComponentHealth::healthy(),
        Err(e) => ComponentHealth::failing(e.to_string()),
    };
    let database = match ctx.storage.health_check().await {
        Ok(()) => ComponentHealth::healthy(),
        Err(e) => ComponentHealth::failing(e.to_string()),
    };
    HealthReport {
        image_store,
        database,
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

fn store_error(err: ImageStoreError) -> ApiError {
    match err {
        ImageStoreError::Rejected { status, message } if (400..500).contains(&status) => {
            ApiError::validation(message)
        }
        ImageStoreError::NotFound(id) => ApiError::not_found(format!("image not found: {id}")),
        other => ApiError::unavailable(other.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
