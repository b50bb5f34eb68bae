pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use client::UpstreamError;
use types::{RrsetPatch, Server, StatEntry, Zone};

/// Everything the gateway asks of the PowerDNS API.
///
/// Identifiers are expected to be validated by the caller. Implementations make
/// exactly one attempt per call and report failures as typed [`UpstreamError`]s.
#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn list_servers(&self) -> Result<Vec<Server>, UpstreamError>;

    async fn list_zones(&self, server_id: &str) -> Result<Vec<Zone>, UpstreamError>;

    async fn get_zone(&self, server_id: &str, zone_id: &str) -> Result<Zone, UpstreamError>;

    /// `spec` is forwarded as-is; PowerDNS decides whether it is a valid zone.
    async fn create_zone(&self, server_id: &str, spec: &Value) -> Result<Zone, UpstreamError>;

    async fn delete_zone(&self, server_id: &str, zone_id: &str) -> Result<(), UpstreamError>;

    async fn patch_rrsets(
        &self,
        server_id: &str,
        zone_id: &str,
        patch: &RrsetPatch,
    ) -> Result<(), UpstreamError>;

    async fn get_statistics(&self, server_id: &str) -> Result<Vec<StatEntry>, UpstreamError>;
}
