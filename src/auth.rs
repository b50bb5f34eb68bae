//! Operator credential checks, the session cookie, and the extractors that
//! guard API routes and browser pages.
use axum::{
    Extension,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use std::future::Future;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;

use crate::SharedState;
use crate::config::SessionConfig;
use crate::error::AppError;
use crate::session::Session;

pub const SESSION_COOKIE: &str = "ndash_session";

/// Decides whether a username/password pair identifies the operator.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Plain equality against the configured operator identity.
pub struct StaticOperator {
    username: String,
    password: String,
}

impl StaticOperator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialVerifier for StaticOperator {
    fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// Operator whose password is stored as an Argon2 PHC string.
pub struct Argon2Operator {
    username: String,
    password_hash: String,
}

impl Argon2Operator {
    /// Fails if `password_hash` is not a parseable PHC string.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> anyhow::Result<Self> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash)
            .map_err(|_| anyhow::anyhow!("admin password hash is not a valid PHC string"))?;
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }
}

impl CredentialVerifier for Argon2Operator {
    fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && verify_password(&self.password_hash, password).unwrap_or(false)
    }
}

/// Hash a plaintext password using Argon2 + random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("Failed to hash password"))?
        .to_string();
    Ok(hash)
}

/// Verify a plaintext password against a stored Argon2 hash.
pub fn verify_password(hash: &str, plain: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| anyhow::anyhow!("Failed to instantiate PasswordHash"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Pull the session token out of the `Cookie` header(s).
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, config: &SessionConfig) -> HeaderValue {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        config.ttl.num_seconds().max(0)
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    // tokens are URL-safe base64, always a valid header value
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` value that makes the browser forget the token.
pub fn clear_session_cookie(config: &SessionConfig) -> HeaderValue {
    let cookie = if config.secure_cookie {
        "ndash_session=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0; Secure"
    } else {
        "ndash_session=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"
    };
    HeaderValue::from_static(cookie)
}

async fn check_session(parts: &mut Parts) -> Result<Session, AppError> {
    let Extension(app_state): Extension<SharedState> = Extension::from_request_parts(parts, &())
        .await
        .map_err(|_| AppError::Internal(anyhow::anyhow!("missing state")))?;

    let token = session_token(&parts.headers);
    Ok(app_state.gate.require(token.as_deref()).await?)
}

/// Extractor for API routes: rejects with 401 in the JSON error shape.
pub struct ApiSession(pub Session);

impl<S> FromRequestParts<S> for ApiSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> {
        Box::pin(async move { check_session(parts).await.map(ApiSession) })
    }
}

/// Extractor for browser pages: sends the visitor to the login page instead.
pub struct PageSession(pub Session);

pub struct LoginRedirect;

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

impl<S> FromRequestParts<S> for PageSession
where
    S: Send + Sync,
{
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> {
        Box::pin(async move {
            match check_session(parts).await {
                Ok(session) => Ok(PageSession(session)),
                Err(AppError::Unauthorized) => Err(LoginRedirect.into_response()),
                Err(other) => Err(other.into_response()),
            }
        })
    }
}
