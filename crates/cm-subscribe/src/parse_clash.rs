//! Structured (Clash-style YAML) document extraction.
//! [Chinese] 结构化（Clash 风格 YAML）文档的代理提取与规范化。
//!
//! Only the `proxies` collection is read. Every element is handled on its own:
//! mappings are normalized, strings are tried as embedded single-line records,
//! and anything that fails validation is reported without touching its
//! neighbours.
use crate::model::{ProtocolType, ProxyOptions, ProxyRecord, SubsError};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;

#[derive(Deserialize)]
struct ClashDoc {
    #[serde(default)]
    proxies: Option<Vec<YamlValue>>,
}

/// Outcome for one element of `proxies`, with its 0-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryResult {
    pub index: usize,
    pub result: Result<ProxyRecord, SubsError>,
}

const CORE_KEYS: &[&str] = &["name", "type", "server", "port"];

/// `type` inference for mappings that omit it. Evaluated top to bottom, the
/// first rule whose keys are all present wins.
const TYPE_INFERENCE: &[(&[&str], ProtocolType)] = &[
    (&["password", "server"], ProtocolType::Trojan),
    (&["uuid"], ProtocolType::Vmess),
    (&["auth"], ProtocolType::Socks5),
];

fn infer_type(map: &Map<String, JsonValue>) -> ProtocolType {
    TYPE_INFERENCE
        .iter()
        .find(|(keys, _)| keys.iter().all(|k| map.contains_key(*k)))
        .map(|(_, p)| p.clone())
        .unwrap_or(ProtocolType::Unknown)
}

fn scalar_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn port_value(v: &JsonValue) -> Result<i64, SubsError> {
    let parsed = match v {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SubsError::RecordParse(format!("port is not an integer: {v}")))
}

/// Normalize one proxy mapping and validate it.
///
/// A missing `name` becomes `proxy_{index + 1}`; a missing `type` is inferred.
pub fn record_from_mapping(map: &Map<String, JsonValue>, index: usize) -> Result<ProxyRecord, SubsError> {
    let name = match map.get("name") {
        Some(v) => scalar_string(v).ok_or(SubsError::Validation("name"))?,
        None => format!("proxy_{}", index + 1),
    };
    let protocol = match map.get("type").and_then(scalar_string) {
        Some(t) => ProtocolType::from_type_str(&t),
        None => infer_type(map),
    };
    let server = map
        .get("server")
        .and_then(scalar_string)
        .ok_or(SubsError::Validation("server"))?;
    let port = port_value(map.get("port").ok_or(SubsError::Validation("port"))?)?;

    let mut options = ProxyOptions::default();
    let mut extra = Map::new();
    for (k, v) in map {
        if CORE_KEYS.contains(&k.as_str()) {
            continue;
        }
        if !options.absorb(k, v) {
            extra.insert(k.clone(), v.clone());
        }
    }

    let record = ProxyRecord {
        name,
        protocol,
        server,
        port,
        options,
        extra,
    };
    record.validate()?;
    Ok(record)
}

fn yaml_to_mapping(v: YamlValue) -> Result<Map<String, JsonValue>, SubsError> {
    match serde_json::to_value(v) {
        Ok(JsonValue::Object(m)) => Ok(m),
        Ok(_) => Err(SubsError::RecordParse("entry is not a mapping".into())),
        Err(e) => Err(SubsError::RecordParse(format!("yaml->json: {e}"))),
    }
}

/// Interpret a string element as an embedded record: first a compact JSON
/// object, then a single YAML list entry.
pub fn record_from_embedded(s: &str, index: usize) -> Result<ProxyRecord, SubsError> {
    let t = s.trim();
    if t.starts_with('{') && t.ends_with('}') {
        if let Ok(JsonValue::Object(m)) = serde_json::from_str::<JsonValue>(t) {
            return record_from_mapping(&m, index);
        }
    }
    let entry = match serde_yaml::from_str::<Vec<YamlValue>>(&format!("- {t}")) {
        Ok(mut items) if items.len() == 1 => items.remove(0),
        _ => return Err(SubsError::RecordParse("not an embedded record".into())),
    };
    record_from_mapping(&yaml_to_mapping(entry)?, index)
}

fn entry_to_record(entry: YamlValue, index: usize) -> Result<ProxyRecord, SubsError> {
    match entry {
        YamlValue::Mapping(_) => record_from_mapping(&yaml_to_mapping(entry)?, index),
        YamlValue::String(s) => record_from_embedded(&s, index),
        _ => Err(SubsError::RecordParse("entry is neither a mapping nor a string".into())),
    }
}

/// Parse a structured document and process each `proxies` element.
///
/// Errors only when the document itself is unreadable or carries no proxies;
/// per-entry failures are returned inside the vector.
pub fn extract(text: &str) -> Result<Vec<EntryResult>, SubsError> {
    let doc: ClashDoc = serde_yaml::from_str(text).map_err(|e| SubsError::RecordParse(e.to_string()))?;
    let proxies = doc
        .proxies
        .filter(|p| !p.is_empty())
        .ok_or_else(|| SubsError::RecordParse("document has no proxies".into()))?;
    Ok(proxies
        .into_iter()
        .enumerate()
        .map(|(index, entry)| EntryResult {
            index,
            result: entry_to_record(entry, index),
        })
        .collect())
}
