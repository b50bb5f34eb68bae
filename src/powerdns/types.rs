//! PowerDNS API payloads. Fields the gateway does not name are kept in `extra`
//! so that whatever upstream returns is handed to the browser unchanged.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,          // "localhost"
    pub daemon_type: String, // "authoritative" / "recursor"
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>, // "type", "url", "config_url", "zones_url"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,   // "example.com."
    pub name: String, // "example.com."
    pub kind: String, // "Native", "Master", "Slave", ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<u64>,
    /// Only present on single-zone responses; zone listings omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrsets: Option<Vec<Rrset>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Replace,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rrset {
    pub name: String, // "www.example.com."
    #[serde(rename = "type")]
    pub rrtype: String, // "A", "NS", ...
    /// PowerDNS accepts DELETE directives without a TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changetype: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub content: String, // "192.0.2.1" or "ns1.example.net."
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a zone PATCH: a change set PowerDNS applies all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrsetPatch {
    pub rrsets: Vec<Rrset>,
}

/// One entry of `/servers/{id}/statistics`. `value` is a string for plain
/// statistics and an array for map and ring statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub stat_type: String, // "StatisticItem", "MapStatisticItem", "RingStatisticItem"
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
