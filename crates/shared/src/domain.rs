use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(QueryId);

/// Folder in the image store that holds public gallery images.
pub const GALLERY_FOLDER: &str = "gallery";
/// Folder in the image store that holds the payment QR code.
pub const QR_FOLDER: &str = "qr-codes";
/// Upper bound on images returned by a gallery listing.
pub const GALLERY_MAX_RESULTS: u32 = 100;
/// Listing depth used when resolving URLs to store identifiers for deletion.
pub const DELETE_RESOLVE_MAX_RESULTS: u32 = 500;
/// Formats the image store is allowed to accept.
pub const ALLOWED_IMAGE_FORMATS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

pub fn gallery_prefix() -> String {
    format!("{GALLERY_FOLDER}/")
}

/// Returns the normalised allow-listed format for a file, looking at the
/// extension first and the content type second.
pub fn allowed_image_format(filename: &str, content_type: Option<&str>) -> Option<&'static str> {
    let from_extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| ALLOWED_IMAGE_FORMATS.iter().copied().find(|f| *f == ext));
    if from_extension.is_some() {
        return from_extension;
    }

    let subtype = content_type?
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")?
        .to_string();
    ALLOWED_IMAGE_FORMATS
        .iter()
        .copied()
        .find(|f| *f == subtype)
}

/// A gallery image, keyed by the public URL the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalleryImage {
    pub url: String,
}

impl GalleryImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Ordered gallery listing, newest first, as last reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryCollection {
    images: Vec<GalleryImage>,
}

impl GalleryCollection {
    /// Builds a collection from listing order, keeping at most
    /// [`GALLERY_MAX_RESULTS`] entries.
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            images: urls
                .into_iter()
                .take(GALLERY_MAX_RESULTS as usize)
                .map(GalleryImage::new)
                .collect(),
        }
    }

    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    pub fn urls(&self) -> Vec<String> {
        self.images.iter().map(|image| image.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.images.iter().any(|image| image.url == url)
    }
}

/// URLs the operator has marked for batch deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    urls: BTreeSet<String>,
}

impl SelectionSet {
    /// Adds `url` when it is part of `collection`. Returns whether the
    /// selection changed.
    pub fn select(&mut self, collection: &GalleryCollection, url: &str) -> bool {
        if !collection.contains(url) {
            return false;
        }
        self.urls.insert(url.to_string())
    }

    pub fn deselect(&mut self, url: &str) -> bool {
        self.urls.remove(url)
    }

    /// Flips membership of `url`; unknown URLs are never added.
    pub fn toggle(&mut self, collection: &GalleryCollection, url: &str) -> bool {
        if self.urls.contains(url) {
            self.urls.remove(url);
            false
        } else {
            self.select(collection, url)
        }
    }

    pub fn select_all(&mut self, collection: &GalleryCollection) {
        self.urls
            .extend(collection.images().iter().map(|image| image.url.clone()));
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.iter().cloned().collect()
    }

    /// Members that no longer appear in `collection`. They stay selected but
    /// cannot match anything in the store.
    pub fn stale_members(&self, collection: &GalleryCollection) -> Vec<String> {
        self.urls
            .iter()
            .filter(|url| !collection.contains(url))
            .cloned()
            .collect()
    }
}

/// One locally selected file waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }
}

/// Files selected through the browse/drag UI, submitted together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    files: Vec<UploadFile>,
}

impl UploadBatch {
    pub fn new(files: Vec<UploadFile>) -> Self {
        Self { files }
    }

    pub fn into_files(self) -> Vec<UploadFile> {
        self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    pub upi_id: String,
    pub upi_name: String,
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            upi_id: String::new(),
            upi_name: String::new(),
            qr_code: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactQuery {
    pub id: QueryId,
    pub full_name: String,
    pub phone_number: String,
    pub subject: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_allow_list_checks_extension_then_content_type() {
        assert_eq!(allowed_image_format("a.JPG", None), Some("jpg"));
        assert_eq!(allowed_image_format("scan", Some("image/webp")), Some("webp"));
        assert_eq!(allowed_image_format("notes.txt", Some("text/plain")), None);
        assert_eq!(allowed_image_format("photo.bmp", Some("image/bmp")), None);
    }

    #[test]
    fn collection_is_capped_at_max_results() {
        let urls = (0..150).map(|i| format!("https://img/{i}.png"));
        let collection = GalleryCollection::from_urls(urls);
        assert_eq!(collection.len(), GALLERY_MAX_RESULTS as usize);
        assert_eq!(collection.images()[0].url, "https://img/0.png");
    }

    #[test]
    fn selection_only_accepts_listed_urls() {
        let collection = GalleryCollection::from_urls(["https://img/a.png"]);
        let mut selection = SelectionSet::default();
        assert!(!selection.select(&collection, "https://img/zzz.png"));
        assert!(selection.toggle(&collection, "https://img/a.png"));
        assert!(selection.contains("https://img/a.png"));
        assert!(!selection.toggle(&collection, "https://img/a.png"));
        assert!(selection.is_empty());
    }

    #[test]
    fn stale_members_survive_refresh() {
        let before = GalleryCollection::from_urls(["https://img/a.png", "https://img/b.png"]);
        let mut selection = SelectionSet::default();
        selection.select_all(&before);

        let after = GalleryCollection::from_urls(["https://img/a.png"]);
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.stale_members(&after), vec!["https://img/b.png"]);
    }
}
