use std::collections::HashSet;

use futures::future::join_all;
use image_store::ImageStoreError;
use shared::{
    domain::{
        allowed_image_format, gallery_prefix, UploadFile, ALLOWED_IMAGE_FORMATS,
        DELETE_RESOLVE_MAX_RESULTS, GALLERY_FOLDER, GALLERY_MAX_RESULTS,
    },
    error::ApiError,
};
use tracing::{debug, info, warn};

use crate::{store_error, ApiContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub images: Vec<String>,
}

/// Current gallery URLs, newest first, capped at the listing limit.
pub async fn list_gallery(ctx: &ApiContext) -> Result<Vec<String>, ApiError> {
    let images = ctx
        .images
        .list(&gallery_prefix(), GALLERY_MAX_RESULTS)
        .await
        .map_err(store_error)?;
    Ok(images.into_iter().map(|image| image.secure_url).collect())
}

/// Stores a batch of gallery images and returns the refreshed listing.
///
/// Every file is checked against the format allow-list before anything is
/// sent to the store, so one bad file rejects the whole batch. A store
/// failure part-way through fails the call without undoing earlier uploads.
pub async fn upload_gallery(
    ctx: &ApiContext,
    files: Vec<UploadFile>,
) -> Result<Vec<String>, ApiError> {
    if files.is_empty() {
        return Err(ApiError::validation("No files provided"));
    }
    for file in &files {
        if file.bytes.is_empty() {
            return Err(ApiError::validation(format!(
                "file '{}' is empty",
                file.filename
            )));
        }
        if allowed_image_format(&file.filename, file.content_type.as_deref()).is_none() {
            return Err(ApiError::validation(format!(
                "file '{}' is not an allowed image format ({})",
                file.filename,
                ALLOWED_IMAGE_FORMATS.join(", ")
            )));
        }
    }

    let results = join_all(
        files
            .iter()
            .map(|file| ctx.images.upload(GALLERY_FOLDER, file)),
    )
    .await;

    let mut stored = 0usize;
    let mut first_error = None;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(image) => {
                stored += 1;
                info!(public_id = %image.public_id, filename = %file.filename, "gallery image stored");
            }
            Err(error) => {
                warn!(filename = %file.filename, %error, "gallery upload failed");
                first_error.get_or_insert(error);
            }
        }
    }
    if let Some(error) = first_error {
        warn!(
            stored,
            requested = files.len(),
            "gallery upload batch failed"
        );
        return Err(store_error(error));
    }

    list_gallery(ctx).await
}

/// Deletes every gallery resource whose URL is in `urls`.
///
/// The store deletes by its own identifier, so the folder is listed first
/// and URLs are matched exactly. Unmatched URLs are ignored as long as at
/// least one matches. Deletes run concurrently with cache invalidation. A
/// resource that is already gone counts as deleted; any other failure fails
/// the batch without rolling back the deletes that succeeded.
pub async fn delete_gallery(ctx: &ApiContext, urls: &[String]) -> Result<DeleteSummary, ApiError> {
    if urls.is_empty() {
        return Err(ApiError::validation("No images provided for deletion"));
    }
    let wanted: HashSet<&str> = urls.iter().map(String::as_str).collect();

    let resources = ctx
        .images
        .list(&gallery_prefix(), DELETE_RESOLVE_MAX_RESULTS)
        .await
        .map_err(store_error)?;
    let matched: Vec<_> = resources
        .into_iter()
        .filter(|resource| wanted.contains(resource.secure_url.as_str()))
        .collect();
    if matched.is_empty() {
        return Err(ApiError::not_found("No matching images found in gallery"));
    }

    let results = join_all(
        matched
            .iter()
            .map(|resource| ctx.images.destroy(&resource.public_id, true)),
    )
    .await;

    let mut failed = 0usize;
    let mut first_error = None;
    for (resource, result) in matched.iter().zip(results) {
        match result {
            Ok(()) => {}
            // Removed by someone else between the listing and the destroy.
            Err(ImageStoreError::NotFound(_)) => {
                debug!(public_id = %resource.public_id, "gallery image already gone");
            }
            Err(error) => {
                warn!(public_id = %resource.public_id, %error, "gallery delete failed");
                failed += 1;
                first_error.get_or_insert(error);
            }
        }
    }
    if let Some(error) = first_error {
        return Err(ApiError::unavailable(format!(
            "Failed to delete {failed} of {} images: {error}",
            matched.len()
        )));
    }

    info!(
        deleted = matched.len(),
        requested = wanted.len(),
        "gallery images deleted"
    );
    let images = list_gallery(ctx).await?;
    Ok(DeleteSummary {
        deleted: matched.len(),
        images,
    })
}
