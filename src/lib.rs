//! Crate entrypoint wiring together configuration, sessions, PowerDNS, and APIs.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod powerdns;
pub mod session;
pub mod validation;

use config::AppConfig;
use powerdns::DnsApi;
use session::SessionGate;

use std::sync::Arc;

/// Complete application dependencies shared across handlers.
pub struct AppState {
    pub config: AppConfig,
    pub pdns: Arc<dyn DnsApi>,
    pub gate: SessionGate,
}

/// Arc-wrapped version of `AppState` passed into Axum extensions.
pub type SharedState = Arc<AppState>;
