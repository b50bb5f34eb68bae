use crate::config::UpstreamConfig;
use crate::powerdns::DnsApi;
use crate::powerdns::types::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure talking to PowerDNS, as seen by the gateway.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, timeout, or the body could not be read.
    #[error("PowerDNS unreachable: {0}")]
    Unreachable(String),

    #[error("PowerDNS rejected the request with status {status}")]
    Rejected { status: u16, body: String },

    #[error("malformed PowerDNS response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    fn unreachable(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Unreachable(format!("request timed out: {err}"))
        } else {
            UpstreamError::Unreachable(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct PowerDnsClient {
    http: Client,
    base_url: String, // e.g. "http://127.0.0.1:8081/api/v1"
    api_key: String,
}

impl PowerDnsClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base(),
            api_key: config.api_key.clone(),
        })
    }

    fn auth_header(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-API-Key", &self.api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send once; anything but a 2xx comes back as `Rejected`.
    async fn send(&self, op: &str, req: RequestBuilder) -> Result<Response, UpstreamError> {
        let res = self.auth_header(req).send().await.map_err(|e| {
            let err = UpstreamError::unreachable(e);
            warn!("PowerDNS {op} failed: {err}");
            err
        })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("PowerDNS {op} failed with {status}");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }

    async fn decode<T: DeserializeOwned>(op: &str, res: Response) -> Result<T, UpstreamError> {
        let bytes = res.bytes().await.map_err(UpstreamError::unreachable)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("PowerDNS {op} returned an undecodable body: {e}");
            UpstreamError::Malformed(e.to_string())
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, op: &str, path: &str) -> Result<T, UpstreamError> {
        let url = self.url(path);
        debug!("GET {url}");
        let res = self.send(op, self.http.get(url)).await?;
        Self::decode(op, res).await
    }
}

#[async_trait]
impl DnsApi for PowerDnsClient {
    async fn list_servers(&self) -> Result<Vec<Server>, UpstreamError> {
        self.get_json("list_servers", "servers").await
    }

    async fn list_zones(&self, server_id: &str) -> Result<Vec<Zone>, UpstreamError> {
        self.get_json("list_zones", &format!("servers/{}/zones", server_id))
            .await
    }

    async fn get_zone(&self, server_id: &str, zone_id: &str) -> Result<Zone, UpstreamError> {
        self.get_json(
            "get_zone",
            &format!("servers/{}/zones/{}", server_id, zone_id),
        )
        .await
    }

    async fn create_zone(&self, server_id: &str, spec: &Value) -> Result<Zone, UpstreamError> {
        let url = self.url(&format!("servers/{}/zones", server_id));
        debug!("POST {url}");
        let res = self
            .send("create_zone", self.http.post(url).json(spec))
            .await?;
        Self::decode("create_zone", res).await
    }

    async fn delete_zone(&self, server_id: &str, zone_id: &str) -> Result<(), UpstreamError> {
        let url = self.url(&format!("servers/{}/zones/{}", server_id, zone_id));
        debug!("DELETE {url}");
        self.send("delete_zone", self.http.delete(url)).await?;
        Ok(())
    }

    async fn patch_rrsets(
        &self,
        server_id: &str,
        zone_id: &str,
        patch: &RrsetPatch,
    ) -> Result<(), UpstreamError> {
        let url = self.url(&format!("servers/{}/zones/{}", server_id, zone_id));
        debug!("PATCH {url} ({} rrsets)", patch.rrsets.len());
        self.send("patch_rrsets", self.http.patch(url).json(patch))
            .await?;
        Ok(())
    }

    async fn get_statistics(&self, server_id: &str) -> Result<Vec<StatEntry>, UpstreamError> {
        self.get_json(
            "get_statistics",
            &format!("servers/{}/statistics", server_id),
        )
        .await
    }
}
