use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use image_store::{CloudinaryConfig, CloudinaryStore, ImageStore, MemoryImageStore};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStoreKind {
    Memory,
    Cloudinary,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub admin_password: String,
    pub session_secret: String,
    pub session_ttl_seconds: i64,
    pub max_upload_bytes: usize,
    pub image_store: Option<ImageStoreKind>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub cloudinary_api_base: Option<String>,
}

pub const DEFAULT_ADMIN_PASSWORD: &str = "changeme";
pub const DEFAULT_SESSION_SECRET: &str = "dev-session-secret";

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/site.db".into(),
            admin_password: DEFAULT_ADMIN_PASSWORD.into(),
            session_secret: DEFAULT_SESSION_SECRET.into(),
            session_ttl_seconds: 8 * 3600,
            max_upload_bytes: 25 * 1024 * 1024,
            image_store: None,
            cloudinary_cloud_name: None,
            cloudinary_api_key: None,
            cloudinary_api_secret: None,
            cloudinary_api_base: None,
        }
    }
}

impl Settings {
    /// Cloudinary when explicitly chosen or when a cloud name is configured,
    /// the in-memory store otherwise.
    pub fn image_store_kind(&self) -> ImageStoreKind {
        self.image_store.unwrap_or(if self.cloudinary_cloud_name.is_some() {
            ImageStoreKind::Cloudinary
        } else {
            ImageStoreKind::Memory
        })
    }

    pub fn uses_default_secrets(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
            || self.session_secret == DEFAULT_SESSION_SECRET
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string("server.toml").ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

/// Applies `server.toml` contents, then environment overrides, on top of the
/// defaults. Later sources win.
pub fn settings_from_sources(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
            if let Some(v) = file_cfg.get("bind_addr") {
                settings.server_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("image_store") {
                settings.image_store = parse_store_kind(v);
            }
            if let Some(v) = file_cfg.get("cloudinary_cloud_name") {
                settings.cloudinary_cloud_name = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("cloudinary_api_base") {
                settings.cloudinary_api_base = Some(v.clone());
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("ADMIN_PASSWORD") {
        settings.admin_password = v;
    }
    if let Some(v) = env("SESSION_SECRET") {
        settings.session_secret = v;
    }
    if let Some(v) = env("SESSION_TTL_SECONDS") {
        if let Ok(parsed) = v.parse::<i64>() {
            settings.session_ttl_seconds = parsed;
        }
    }
    if let Some(v) = env("MAX_UPLOAD_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_upload_bytes = parsed;
        }
    }

    if let Some(v) = env("IMAGE_STORE") {
        settings.image_store = parse_store_kind(&v);
    }
    if let Some(v) = env("CLOUDINARY_CLOUD_NAME") {
        settings.cloudinary_cloud_name = Some(v);
    }
    if let Some(v) = env("CLOUDINARY_API_KEY") {
        settings.cloudinary_api_key = Some(v);
    }
    if let Some(v) = env("CLOUDINARY_API_SECRET") {
        settings.cloudinary_api_secret = Some(v);
    }
    if let Some(v) = env("CLOUDINARY_API_BASE") {
        settings.cloudinary_api_base = Some(v);
    }

    settings
}

fn parse_store_kind(raw: &str) -> Option<ImageStoreKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "memory" => Some(ImageStoreKind::Memory),
        "cloudinary" => Some(ImageStoreKind::Cloudinary),
        _ => None,
    }
}

pub fn build_image_store(settings: &Settings) -> anyhow::Result<Arc<dyn ImageStore>> {
    match settings.image_store_kind() {
        ImageStoreKind::Memory => Ok(Arc::new(MemoryImageStore::default())),
        ImageStoreKind::Cloudinary => {
            let cloud_name = required(&settings.cloudinary_cloud_name, "CLOUDINARY_CLOUD_NAME")?;
            let api_key = required(&settings.cloudinary_api_key, "CLOUDINARY_API_KEY")?;
            let api_secret = required(&settings.cloudinary_api_secret, "CLOUDINARY_API_SECRET")?;
            let mut config = CloudinaryConfig::new(cloud_name, api_key, api_secret);
            if let Some(base) = &settings.cloudinary_api_base {
                config.api_base = base.clone();
            }
            Ok(Arc::new(CloudinaryStore::new(config)))
        }
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing {name} for the cloudinary image store"),
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
