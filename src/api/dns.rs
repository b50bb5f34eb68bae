// src/api/dns.rs
//! The PowerDNS passthrough API. Every handler is session-guarded, checks its
//! path parameters, and returns upstream payloads as they came.
use axum::{
    Extension, Json,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
};
use serde_json::Value;
use tracing::{info, trace};

use crate::SharedState;
use crate::auth::ApiSession;
use crate::error::AppError;
use crate::powerdns::types::{RrsetPatch, Server, StatEntry, Zone};
use crate::validation::validate_path_param;

fn server_param(path: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    let Path(server_id) = path.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok(validate_path_param("serverId", &server_id)?.to_string())
}

fn zone_params(
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<(String, String), AppError> {
    let Path((server_id, zone_id)) = path.map_err(|e| AppError::bad_request(e.body_text()))?;
    Ok((
        validate_path_param("serverId", &server_id)?.to_string(),
        validate_path_param("zoneId", &zone_id)?.to_string(),
    ))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::bad_request(e.body_text()))
}

fn success() -> Json<Value> {
    Json(serde_json::json!({ "success": true }))
}

// GET /api/servers
pub async fn list_servers(
    ApiSession(_): ApiSession,
    Extension(state): Extension<SharedState>,
) -> Result<Json<Vec<Server>>, AppError> {
    Ok(Json(state.pdns.list_servers().await?))
}

// GET /api/servers/{server_id}/zones
pub async fn list_zones(
    ApiSession(_): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Zone>>, AppError> {
    let server_id = server_param(path)?;
    Ok(Json(state.pdns.list_zones(&server_id).await?))
}

// GET /api/servers/{server_id}/zones/{zone_id}
pub async fn get_zone(
    ApiSession(_): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<Zone>, AppError> {
    let (server_id, zone_id) = zone_params(path)?;
    Ok(Json(state.pdns.get_zone(&server_id, &zone_id).await?))
}

// POST /api/servers/{server_id}/zones
pub async fn create_zone(
    ApiSession(session): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Zone>, AppError> {
    let server_id = server_param(path)?;
    let spec = json_body(body)?;
    if !spec.is_object() {
        return Err(AppError::bad_request("zone spec must be a JSON object"));
    }

    let zone_name = spec.get("name").and_then(|v| v.as_str()).unwrap_or("<unnamed>");
    let zone_kind = spec.get("kind").and_then(|v| v.as_str()).unwrap_or("<default>");
    info!(
        user = %session.username,
        server = %server_id,
        zone = zone_name,
        kind = zone_kind,
        "creating zone"
    );
    trace!("zone spec: {spec}");

    Ok(Json(state.pdns.create_zone(&server_id, &spec).await?))
}

// DELETE /api/servers/{server_id}/zones/{zone_id}
pub async fn delete_zone(
    ApiSession(session): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<Value>, AppError> {
    let (server_id, zone_id) = zone_params(path)?;
    info!(user = %session.username, server = %server_id, zone = %zone_id, "deleting zone");

    state.pdns.delete_zone(&server_id, &zone_id).await?;
    Ok(success())
}

// PATCH /api/servers/{server_id}/zones/{zone_id}
pub async fn patch_records(
    ApiSession(session): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Json<RrsetPatch>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let (server_id, zone_id) = zone_params(path)?;
    let patch = json_body(body)?;
    info!(
        user = %session.username,
        server = %server_id,
        zone = %zone_id,
        rrsets = patch.rrsets.len(),
        "patching records"
    );

    state.pdns.patch_rrsets(&server_id, &zone_id, &patch).await?;
    Ok(success())
}

// GET /api/servers/{server_id}/statistics
pub async fn get_statistics(
    ApiSession(_): ApiSession,
    Extension(state): Extension<SharedState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<StatEntry>>, AppError> {
    let server_id = server_param(path)?;
    Ok(Json(state.pdns.get_statistics(&server_id).await?))
}
