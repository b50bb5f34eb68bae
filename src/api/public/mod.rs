//! Login and logout: the only routes reachable without a session.
use axum::{
    Extension, Json,
    extract::{Form, FromRequest, Request},
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::future::Future;
use tracing::info;

use crate::SharedState;
use crate::api::pages;
use crate::auth;
use crate::error::AppError;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login body, accepted as JSON (the bundled UI) or as a classic form post.
pub struct LoginBody(pub LoginRequest);

impl<S> FromRequest<S> for LoginBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request(req: Request, state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> {
        Box::pin(async move {
            let is_json = req
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("application/json"));

            let body = if is_json {
                Json::<LoginRequest>::from_request(req, state)
                    .await
                    .map(|Json(body)| body)
                    .map_err(|e| AppError::bad_request(e.body_text()))?
            } else {
                Form::<LoginRequest>::from_request(req, state)
                    .await
                    .map(|Form(body)| body)
                    .map_err(|e| AppError::bad_request(e.body_text()))?
            };
            Ok(LoginBody(body))
        })
    }
}

// GET /login
pub async fn login_page(Extension(state): Extension<SharedState>, headers: HeaderMap) -> Response {
    let token = auth::session_token(&headers);
    if state.gate.require(token.as_deref()).await.is_ok() {
        return Redirect::to("/").into_response();
    }
    pages::asset_response("login.html")
}

// POST /login
pub async fn login(
    Extension(state): Extension<SharedState>,
    headers: HeaderMap,
    LoginBody(req): LoginBody,
) -> Result<Response, AppError> {
    let previous = auth::session_token(&headers);
    let (token, _) = state
        .gate
        .authenticate(previous.as_deref(), &req.username, &req.password)
        .await?;

    let cookie = auth::session_cookie(&token, &state.config.session);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "success": true })),
    )
        .into_response())
}

// GET /logout
pub async fn logout(Extension(state): Extension<SharedState>, headers: HeaderMap) -> Response {
    if let Some(token) = auth::session_token(&headers) {
        state.gate.destroy(&token).await;
        info!("session closed");
    }

    (
        [(header::SET_COOKIE, auth::clear_session_cookie(&state.config.session))],
        Redirect::to("/login"),
    )
        .into_response()
}
