pub mod dns;
pub mod pages;
pub mod public;

use axum::{
    Extension, Router,
    http::{HeaderValue, header},
    routing::get,
};
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::SharedState;

pub fn create_router(state: SharedState) -> Router {
    use crate::api::{dns, pages, public};

    Router::new()
        // public
        .route("/login", get(public::login_page).post(public::login))
        .route("/logout", get(public::logout))
        // browser pages
        .route("/", get(pages::dashboard))
        .route("/zones", get(pages::zones))
        .route("/statistics", get(pages::statistics))
        .route("/settings", get(pages::settings))
        // authenticated API
        .route("/api/servers", get(dns::list_servers))
        .route(
            "/api/servers/{server_id}/zones",
            get(dns::list_zones).post(dns::create_zone),
        )
        .route(
            "/api/servers/{server_id}/zones/{zone_id}",
            get(dns::get_zone)
                .delete(dns::delete_zone)
                .patch(dns::patch_records),
        )
        .route("/api/servers/{server_id}/statistics", get(dns::get_statistics))
        .fallback(pages::fallback)
        .layer(Extension(state))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
