use image_store::ImageStoreError;
use shared::{
    domain::{allowed_image_format, PaymentSettings, UploadFile, QR_FOLDER},
    error::ApiError,
    protocol::SaveSettingsRequest,
};
use tracing::{info, warn};

use crate::{internal, store_error, ApiContext};

/// Stored payment settings, or the empty defaults when none were saved.
pub async fn get_settings(ctx: &ApiContext) -> Result<PaymentSettings, ApiError> {
    let stored = ctx
        .storage
        .load_payment_settings()
        .await
        .map_err(internal)?;
    Ok(stored.map(|s| s.settings).unwrap_or_default())
}

pub async fn save_settings(
    ctx: &ApiContext,
    req: SaveSettingsRequest,
) -> Result<PaymentSettings, ApiError> {
    let upi_id = req.upi_id.trim();
    let upi_name = req.upi_name.trim();
    if upi_id.is_empty() {
        return Err(ApiError::validation("Please enter a UPI ID"));
    }

    ctx.storage
        .save_payment_details(upi_id, upi_name)
        .await
        .map_err(internal)?;
    info!(%upi_id, "payment settings saved");
    get_settings(ctx).await
}

/// Uploads a new QR code, records it, and removes the one it replaces.
pub async fn upload_qr(ctx: &ApiContext, file: UploadFile) -> Result<String, ApiError> {
    if file.bytes.is_empty() {
        return Err(ApiError::validation("No file provided"));
    }
    if allowed_image_format(&file.filename, file.content_type.as_deref()).is_none() {
        return Err(ApiError::validation(format!(
            "file '{}' is not an allowed image format",
            file.filename
        )));
    }

    let image = ctx
        .images
        .upload(QR_FOLDER, &file)
        .await
        .map_err(store_error)?;
    let previous = ctx
        .storage
        .set_qr_code(&image.secure_url, &image.public_id)
        .await
        .map_err(internal)?;

    if let Some(previous) = previous.filter(|id| *id != image.public_id) {
        if let Err(error) = ctx.images.destroy(&previous, true).await {
            warn!(public_id = %previous, %error, "failed to remove replaced qr code");
        }
    }

    info!(public_id = %image.public_id, "qr code uploaded");
    Ok(image.secure_url)
}

/// Removes the QR code from the store, then clears it from the settings.
pub async fn remove_qr(ctx: &ApiContext) -> Result<(), ApiError> {
    let stored = ctx
        .storage
        .load_payment_settings()
        .await
        .map_err(internal)?;

    if let Some(public_id) = stored.and_then(|s| s.qr_public_id) {
        match ctx.images.destroy(&public_id, true).await {
            Ok(()) | Err(ImageStoreError::NotFound(_)) => {}
            Err(error) => return Err(store_error(error)),
        }
    }

    ctx.storage.clear_qr_code().await.map_err(internal)?;
    info!("qr code removed");
    Ok(())
}
