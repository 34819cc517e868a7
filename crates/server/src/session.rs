use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::error::{ApiError, ErrorCode};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::app_state::AppState;

const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub admin_password: String,
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid password")]
    WrongPassword,
    #[error("invalid session token: {0}")]
    InvalidToken(String),
    #[error("failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Exchanges the admin password for a signed, expiring session token.
pub fn issue_session(cfg: &SessionConfig, password: &str) -> Result<IssuedSession, SessionError> {
    if !password_matches(password, &cfg.admin_password) {
        return Err(SessionError::WrongPassword);
    }

    let now = Utc::now();
    let expires_at = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: ADMIN_SUBJECT.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?;
    Ok(IssuedSession { token, expires_at })
}

pub fn validate_session(cfg: &SessionConfig, token: &str) -> Result<(), SessionError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.sub = Some(ADMIN_SUBJECT.to_string());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .map(|_| ())
    .map_err(|e| SessionError::InvalidToken(e.to_string()))
}

// Digests first so both sides have the same length whatever was typed.
fn password_matches(candidate: &str, expected: &str) -> bool {
    let candidate = Sha256::digest(candidate.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    candidate.as_slice().ct_eq(expected.as_slice()).into()
}

/// Proof that the request carried a valid admin bearer token.
pub(crate) struct AdminSession;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminSession {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized("admin session required"))?;

        validate_session(&state.session, token).map_err(|error| {
            warn!(%error, "rejected admin session");
            unauthorized("admin session is invalid or expired")
        })?;
        Ok(AdminSession)
    }
}

fn unauthorized(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new(ErrorCode::Unauthorized, message)),
    )
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
