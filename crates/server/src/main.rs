use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use shared::{
    domain::{ContactQuery, PaymentSettings, QueryId, UploadFile},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminLoginRequest, AdminLoginResponse, ContactSubmission, ContactSubmitted,
        DeleteGalleryRequest, GalleryListQuery, GalleryResponse, QrUploadResponse,
        SaveSettingsRequest, SuccessResponse,
    },
};
use site_api::ApiContext;
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod session;

use app_state::AppState;
use config::{build_image_store, load_settings, prepare_database_url};
use session::{issue_session, AdminSession, SessionConfig, SessionError};

type Failure = (StatusCode, Json<ApiError>);
type GalleryFailure = (StatusCode, Json<GalleryResponse>);

const GALLERY_FILES_FIELD: &str = "files";
const QR_FIELD: &str = "qr";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.uses_default_secrets() {
        warn!("ADMIN_PASSWORD or SESSION_SECRET is unset; using development defaults");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let images = build_image_store(&settings)?;
    info!(store = ?settings.image_store_kind(), "image store configured");

    let state = AppState {
        api: ApiContext { storage, images },
        session: SessionConfig {
            admin_password: settings.admin_password,
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state), settings.max_upload_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/health", get(health))
        .route("/api/gallery", get(http_list_gallery))
        .route("/api/gallery/upload", post(http_upload_gallery))
        .route("/api/gallery/delete", post(http_delete_gallery))
        .route("/api/settings", get(http_get_settings).post(http_save_settings))
        .route("/api/settings/qr", post(http_upload_qr).delete(http_remove_qr))
        .route("/api/contact", post(http_submit_contact))
        .route("/api/contact/queries", get(http_list_queries))
        .route("/api/contact/queries/:id", delete(http_delete_query))
        .route("/api/admin/login", post(admin_login))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Unavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: ApiError) -> Failure {
    (status_for(err.code), Json(err))
}

fn gallery_failure(err: ApiError) -> GalleryFailure {
    (status_for(err.code), Json(GalleryResponse::failed(&err)))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(ErrorCode::PayloadTooLarge, err.body_text())
    } else {
        ApiError::validation(format!("invalid multipart body: {}", err.body_text()))
    }
}

/// Collects every file part named `field`; other parts are skipped.
async fn read_files(mut multipart: Multipart, field: &str) -> Result<Vec<UploadFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(part) = multipart.next_field().await.map_err(multipart_error)? {
        if part.name() != Some(field) {
            continue;
        }
        let filename = part
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let content_type = part.content_type().map(str::to_string);
        let bytes = part.bytes().await.map_err(multipart_error)?;
        files.push(UploadFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = site_api::store_health(&state.api).await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        warn!(?report, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

async fn http_list_gallery(
    State(state): State<Arc<AppState>>,
    Query(_cache_bust): Query<GalleryListQuery>,
) -> Result<impl IntoResponse, GalleryFailure> {
    let images = site_api::list_gallery(&state.api)
        .await
        .map_err(gallery_failure)?;
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(GalleryResponse::listing(images)),
    ))
}

async fn http_upload_gallery(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    multipart: Multipart,
) -> Result<Json<GalleryResponse>, GalleryFailure> {
    let files = read_files(multipart, GALLERY_FILES_FIELD)
        .await
        .map_err(gallery_failure)?;
    let images = site_api::upload_gallery(&state.api, files)
        .await
        .map_err(gallery_failure)?;
    Ok(Json(GalleryResponse::listing(images)))
}

async fn http_delete_gallery(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Json(req): Json<DeleteGalleryRequest>,
) -> Result<Json<GalleryResponse>, GalleryFailure> {
    let summary = site_api::delete_gallery(&state.api, &req.images)
        .await
        .map_err(gallery_failure)?;
    Ok(Json(GalleryResponse::deletion(summary.deleted, summary.images)))
}

async fn http_get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PaymentSettings>, Failure> {
    let settings = site_api::get_settings(&state.api).await.map_err(failure)?;
    Ok(Json(settings))
}

async fn http_save_settings(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Json(req): Json<SaveSettingsRequest>,
) -> Result<Json<PaymentSettings>, Failure> {
    let settings = site_api::save_settings(&state.api, req)
        .await
        .map_err(failure)?;
    Ok(Json(settings))
}

async fn http_upload_qr(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    multipart: Multipart,
) -> Result<Json<QrUploadResponse>, Failure> {
    let file = read_files(multipart, QR_FIELD)
        .await
        .map_err(failure)?
        .into_iter()
        .next()
        .ok_or_else(|| failure(ApiError::validation("No file provided")))?;
    let url = site_api::upload_qr(&state.api, file)
        .await
        .map_err(failure)?;
    Ok(Json(QrUploadResponse { success: true, url }))
}

async fn http_remove_qr(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<SuccessResponse>, Failure> {
    site_api::remove_qr(&state.api).await.map_err(failure)?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn http_submit_contact(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<ContactSubmission>,
) -> Result<Json<ContactSubmitted>, Failure> {
    site_api::submit_contact(&state.api, submission)
        .await
        .map_err(failure)?;
    Ok(Json(ContactSubmitted {
        message: "Form data submitted successfully!".to_string(),
    }))
}

async fn http_list_queries(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
) -> Result<Json<Vec<ContactQuery>>, Failure> {
    let queries = site_api::list_queries(&state.api)
        .await
        .map_err(failure)?;
    Ok(Json(queries))
}

async fn http_delete_query(
    State(state): State<Arc<AppState>>,
    _admin: AdminSession,
    Path(id): Path<i64>,
) -> Result<StatusCode, Failure> {
    site_api::delete_query(&state.api, QueryId(id))
        .await
        .map_err(failure)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>, Failure> {
    match issue_session(&state.session, &req.password) {
        Ok(issued) => {
            info!(expires_at = %issued.expires_at, "admin session issued");
            Ok(Json(AdminLoginResponse {
                token: issued.token,
                expires_at: issued.expires_at,
            }))
        }
        Err(SessionError::WrongPassword) => {
            warn!("admin login rejected");
            Err(failure(ApiError::new(
                ErrorCode::Unauthorized,
                "Invalid password",
            )))
        }
        Err(e) => {
            error!(error = %e, "failed to issue admin session");
            Err(failure(ApiError::internal(e.to_string())))
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
