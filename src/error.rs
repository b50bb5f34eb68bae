// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::powerdns::client::UpstreamError;
use crate::session::{AuthError, Unauthorized};
use crate::validation::ValidationError;

#[derive(Debug, Serialize)]
pub struct ErrorResponseBody {
    pub error: String,
    pub status: u16,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    /// Status code and caller-facing message for this error. Pure; logging
    /// happens in `into_response`.
    pub fn normalize(&self) -> (StatusCode, String) {
        match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".into(),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".into()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found".into()),
            AppError::Upstream(UpstreamError::Unreachable(msg)) => {
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Upstream(UpstreamError::Rejected { status, body }) => {
                let status = StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, upstream_message(status, body))
            }
            AppError::Upstream(UpstreamError::Malformed(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
            ),
        }
    }
}

/// PowerDNS reports errors as `{"error": "..."}`; fall back to the raw body,
/// then to the reason phrase.
fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(serde_json::Value::String(msg)) = obj.get("error") {
            return msg.clone();
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("upstream error")
        .to_string()
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::InvalidCredentials,
            AuthError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<Unauthorized> for AppError {
    fn from(_: Unauthorized) -> Self {
        AppError::Unauthorized
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = self.normalize();

        match &self {
            AppError::Internal(err) => error!("internal error: {err:#}"),
            AppError::Upstream(err) if status.is_server_error() => error!("{err}"),
            AppError::Upstream(err) => warn!("{err}"),
            _ => {}
        }

        let body = Json(ErrorResponseBody {
            error: msg,
            status: status.as_u16(),
        });
        (status, body).into_response()
    }
}
