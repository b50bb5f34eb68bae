use std::time::Duration;

#[derive(Clone)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub session: SessionConfig,
}

/// Where and how to reach the PowerDNS API.
#[derive(Clone)]
pub struct UpstreamConfig {
    pub base_url: String, // "http://127.0.0.1:8081" or ".../api/v1"
    pub api_key: String,
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Versioned API root without trailing slash (e.g. http://127.0.0.1:8081/api/v1).
    pub fn api_base(&self) -> String {
        let root = self.base_url.trim().trim_end_matches('/');
        if root.ends_with("/api/v1") {
            root.to_string()
        } else {
            format!("{}/api/v1", root)
        }
    }
}

/// Longest session lifetime accepted from configuration (10 years).
pub const MAX_SESSION_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Validate a configured session lifetime in seconds.
pub fn session_ttl(secs: i64) -> anyhow::Result<chrono::Duration> {
    if secs <= 0 {
        anyhow::bail!("session TTL must be positive");
    }
    if secs > MAX_SESSION_TTL_SECS {
        anyhow::bail!("session TTL must not exceed {MAX_SESSION_TTL_SECS} seconds");
    }
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| anyhow::anyhow!("session TTL of {secs} seconds is out of range"))
}

#[derive(Clone)]
pub struct SessionConfig {
    pub ttl: chrono::Duration,
    /// Add `Secure` to the session cookie (set when served over HTTPS).
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(24),
            secure_cookie: false,
        }
    }
}
