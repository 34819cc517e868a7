use thiserror::Error;

/// Failures surfaced by the gallery backend and the coordinator.
///
/// Every variant carries text fit for display; the coordinator copies it into
/// the operation's status message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GalleryError {
    #[error("failed to load gallery: {0}")]
    List(String),
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("No matching images found in gallery")]
    DeleteNotFound,
    #[error("delete failed: {0}")]
    Delete(String),
    #[error("failed to save settings: {0}")]
    SettingsSave(String),
    #[error("admin login failed: {0}")]
    Session(String),
}
