//! Browser-facing pages and static assets, embedded from `dist/`.
use axum::{
    body::Body,
    extract::OriginalUri,
    http::{Method, Response, StatusCode, header},
    response::{Html, IntoResponse},
};
use rust_embed::RustEmbed;

use crate::auth::PageSession;
use crate::error::AppError;

#[derive(RustEmbed)]
#[folder = "dist"]
struct EmbeddedDist;

const CSP: &str = "default-src 'self'; base-uri 'self'; frame-ancestors 'none'; form-action 'self'; \
                   script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; \
                   connect-src 'self'; object-src 'none'";

/// Serve an embedded file, or the error view if it is missing.
pub fn asset_response(path: &str) -> Response<Body> {
    embedded_response(path, &Method::GET)
        .unwrap_or_else(|| error_page(StatusCode::NOT_FOUND, "Page not found"))
}

fn embedded_response(path: &str, method: &Method) -> Option<Response<Body>> {
    let asset = EmbeddedDist::get(path)?;
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(asset.data.into_owned())
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(
            header::CACHE_CONTROL,
            if path.ends_with(".html") {
                "no-cache"
            } else {
                "public, max-age=3600"
            },
        )
        .header(header::CONTENT_SECURITY_POLICY, CSP)
        .body(body)
        .ok()
}

/// Generic error view with the message filled in.
pub fn error_page(status: StatusCode, message: &str) -> Response<Body> {
    let template = EmbeddedDist::get("error.html")
        .map(|f| String::from_utf8_lossy(&f.data).into_owned())
        .unwrap_or_else(|| "<h1>{{status}}</h1><p>{{message}}</p>".to_string());
    let page = template
        .replace("{{status}}", status.as_str())
        .replace("{{message}}", &escape_html(message));

    (status, Html(page)).into_response()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// GET /
pub async fn dashboard(PageSession(_): PageSession) -> Response<Body> {
    asset_response("index.html")
}

// GET /zones
pub async fn zones(PageSession(_): PageSession) -> Response<Body> {
    asset_response("zones.html")
}

// GET /statistics
pub async fn statistics(PageSession(_): PageSession) -> Response<Body> {
    asset_response("statistics.html")
}

// GET /settings
pub async fn settings(PageSession(_): PageSession) -> Response<Body> {
    asset_response("settings.html")
}

/// `/static/*`, unknown `/api/*` paths, and everything else.
pub async fn fallback(method: Method, OriginalUri(uri): OriginalUri) -> Response<Body> {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::NotFound.into_response();
    }

    if let Some(asset) = path.strip_prefix("/static/") {
        if (method == Method::GET || method == Method::HEAD) && !asset.contains("..") {
            if let Some(resp) = embedded_response(asset, &method) {
                return resp;
            }
        }
    }

    error_page(StatusCode::NOT_FOUND, "Page not found")
}
