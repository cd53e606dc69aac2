//! Canonical proxy records, proxy groups and the subscription error taxonomy.
//! [Chinese] 规范化代理记录、代理组以及订阅错误分类。
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubsError {
    /// Base64 envelope could not be decoded; the caller falls back to raw text.
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unrecognised subscription format")]
    ClassifyAmbiguous,
    #[error("record parse error: {0}")]
    RecordParse(String),
    #[error("missing required field: {0}")]
    Validation(&'static str),
    /// Zero valid records across every source. Fatal to the run.
    #[error("no valid proxy records in any source")]
    EmptyAggregate,
    #[error("fetch error: {0}")]
    Fetch(String),
}

impl SubsError {
    /// Short stable label used in the end-of-run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::ClassifyAmbiguous => "classify_ambiguous",
            Self::RecordParse(_) => "record_parse",
            Self::Validation(_) => "validation",
            Self::EmptyAggregate => "empty_aggregate",
            Self::Fetch(_) => "fetch",
        }
    }
}

/// Proxy protocol. Document `type` values outside the known set are kept
/// verbatim in `Other` so they render back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolType {
    Ss,
    Ssr,
    Vmess,
    Vless,
    Trojan,
    Socks5,
    Http,
    Https,
    Hysteria,
    Hysteria2,
    Snell,
    /// No `type` given and none could be inferred.
    Unknown,
    Other(String),
}

impl ProtocolType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ss => "ss",
            Self::Ssr => "ssr",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Socks5 => "socks5",
            Self::Http => "http",
            Self::Https => "https",
            Self::Hysteria => "hysteria",
            Self::Hysteria2 => "hysteria2",
            Self::Snell => "snell",
            Self::Unknown => "unknown",
            Self::Other(s) => s,
        }
    }

    /// Maps a document `type` value exactly; anything else is kept as `Other`.
    pub fn from_type_str(s: &str) -> Self {
        match s {
            "ss" => Self::Ss,
            "ssr" => Self::Ssr,
            "vmess" => Self::Vmess,
            "vless" => Self::Vless,
            "trojan" => Self::Trojan,
            "socks5" => Self::Socks5,
            "http" => Self::Http,
            "https" => Self::Https,
            "hysteria" => Self::Hysteria,
            "hysteria2" => Self::Hysteria2,
            "snell" => Self::Snell,
            "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for ProtocolType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_type_str(&s))
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsHeaders {
    #[serde(rename = "Host")]
    pub host: String,
}

/// WebSocket transport options (`ws-opts`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WsOpts {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<WsHeaders>,
    #[serde(
        default,
        rename = "max-early-data",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_early_data: Option<i64>,
    #[serde(
        default,
        rename = "early-data-header-name",
        skip_serializing_if = "Option::is_none"
    )]
    pub early_data_header_name: Option<String>,
}

/// Reality TLS camouflage options (`reality-opts`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealityOpts {
    #[serde(rename = "public-key")]
    pub public_key: String,
    #[serde(default, rename = "short-id", skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

/// Protocol-specific optional fields. Field order here is the render order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProxyOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servername: Option<String>,
    #[serde(rename = "skip-cert-verify", skip_serializing_if = "Option::is_none")]
    pub skip_cert_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(rename = "client-fingerprint", skip_serializing_if = "Option::is_none")]
    pub client_fingerprint: Option<String>,
    #[serde(rename = "ws-opts", skip_serializing_if = "Option::is_none")]
    pub ws_opts: Option<WsOpts>,
    #[serde(rename = "reality-opts", skip_serializing_if = "Option::is_none")]
    pub reality_opts: Option<RealityOpts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<String>,
}

/// Deserialize `v` as `T` only when re-serializing gives back exactly `v`.
fn lift<T: DeserializeOwned + Serialize>(v: &Value) -> Option<T> {
    let t: T = serde_json::from_value(v.clone()).ok()?;
    match serde_json::to_value(&t) {
        Ok(back) if back == *v => Some(t),
        _ => None,
    }
}

impl ProxyOptions {
    /// Try to move one document key into its typed slot.
    /// Returns `false` when the key is unknown or the value would not survive
    /// the conversion unchanged; the caller keeps it as passthrough then.
    pub(crate) fn absorb(&mut self, key: &str, v: &Value) -> bool {
        fn set<T: DeserializeOwned + Serialize>(slot: &mut Option<T>, v: &Value) -> bool {
            match lift::<T>(v) {
                Some(t) => {
                    *slot = Some(t);
                    true
                }
                None => false,
            }
        }
        match key {
            "uuid" => set(&mut self.uuid, v),
            "password" => set(&mut self.password, v),
            "method" => set(&mut self.method, v),
            "cipher" => set(&mut self.cipher, v),
            "alterId" => set(&mut self.alter_id, v),
            "network" => set(&mut self.network, v),
            "tls" => set(&mut self.tls, v),
            "sni" => set(&mut self.sni, v),
            "servername" => set(&mut self.servername, v),
            "skip-cert-verify" => set(&mut self.skip_cert_verify, v),
            "udp" => set(&mut self.udp, v),
            "flow" => set(&mut self.flow, v),
            "client-fingerprint" => set(&mut self.client_fingerprint, v),
            "ws-opts" => set(&mut self.ws_opts, v),
            "reality-opts" => set(&mut self.reality_opts, v),
            "mport" => set(&mut self.mport, v),
            "ports" => set(&mut self.ports, v),
            _ => false,
        }
    }
}

/// One canonical proxy. Names are not unique, duplicates are kept as-is.
/// [Chinese] 规范代理记录；名称不保证唯一，重复名称原样保留。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub protocol: ProtocolType,
    pub server: String,
    pub port: i64,
    #[serde(flatten)]
    pub options: ProxyOptions,
    /// Document keys without a typed slot, in input order.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProxyRecord {
    pub fn new(name: impl Into<String>, protocol: ProtocolType, server: impl Into<String>, port: i64) -> Self {
        Self {
            name: name.into(),
            protocol,
            server: server.into(),
            port,
            options: ProxyOptions::default(),
            extra: Map::new(),
        }
    }

    /// Name and server must be non-empty. Type and port are enforced by
    /// construction.
    pub fn validate(&self) -> Result<(), SubsError> {
        if self.name.is_empty() {
            return Err(SubsError::Validation("name"));
        }
        if self.server.is_empty() {
            return Err(SubsError::Validation("server"));
        }
        Ok(())
    }

    /// Compact single-line JSON, non-ASCII kept verbatim.
    pub fn to_compact_line(&self) -> Result<String, SubsError> {
        serde_json::to_string(self).map_err(|e| SubsError::RecordParse(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    Select,
    UrlTest,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub proxies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
}
