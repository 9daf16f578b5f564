//! Server directory payload: `{"1": {"Servers": [...]}}`.
//!
//! The same payload is stored in the fallback file wrapped as
//! `{"data": <payload>, "timestamp": "<rfc3339>"}`; both shapes parse.
//!
//! Numeric fields arrive as numbers or numeric strings depending on the
//! endpoint version. Missing required fields are schema errors.

use crate::error::{ForecastError, Result};
use crate::models::{sort_chronologically, MapType, ServerRecord};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Fallback-file wrapper around a raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackFile {
    pub data: Value,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(rename = "ServerId", deserialize_with = "lenient_u32")]
    server_id: u32,
    #[serde(rename = "OpenTime", deserialize_with = "lenient_i64")]
    open_time: i64,
    #[serde(rename = "MapType", default)]
    map_type: Option<String>,
    #[serde(rename = "DistrictId", deserialize_with = "lenient_u32")]
    district_id: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => Ok(v),
        Lenient::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
        Lenient::Float(v) => Err(de::Error::custom(format!("expected integer, found {v}"))),
        Lenient::Text(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("expected numeric string, found {s:?}"))),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let v = lenient_i64(deserializer)?;
    u32::try_from(v).map_err(|_| de::Error::custom(format!("{v} out of range")))
}

impl RawServer {
    fn into_record(self) -> Result<ServerRecord> {
        let opened_at = DateTime::<Utc>::from_timestamp(self.open_time, 0).ok_or_else(|| {
            ForecastError::Schema(format!(
                "server {}: OpenTime {} out of range",
                self.server_id, self.open_time
            ))
        })?;
        let map_type = match self.map_type {
            Some(label) if !label.trim().is_empty() => MapType::new(label),
            _ => MapType::unknown(),
        };
        Ok(ServerRecord::new(self.server_id, opened_at, map_type, self.district_id))
    }
}

/// Server list inside a payload or fallback wrapper.
fn servers_of(root: &Value) -> Result<&Vec<Value>> {
    let payload = match root.get("data") {
        Some(inner) if inner.get("1").is_some() => inner,
        _ => root,
    };
    payload
        .get("1")
        .and_then(|region| region.get("Servers"))
        .and_then(Value::as_array)
        .ok_or_else(|| ForecastError::Schema("expected {\"1\": {\"Servers\": [...]}}".to_string()))
}

/// Parse an already-decoded payload into chronologically sorted records.
pub fn parse_payload_value(root: &Value) -> Result<Vec<ServerRecord>> {
    let servers = servers_of(root)?;
    if servers.is_empty() {
        return Err(ForecastError::Schema("payload contains no servers".to_string()));
    }

    let mut records = servers
        .iter()
        .enumerate()
        .map(|(i, server)| {
            RawServer::deserialize(server)
                .map_err(|e| ForecastError::Schema(format!("server #{i}: {e}")))
                .and_then(RawServer::into_record)
        })
        .collect::<Result<Vec<_>>>()?;
    sort_chronologically(&mut records);
    Ok(records)
}

pub fn parse_api_payload(text: &str) -> Result<Vec<ServerRecord>> {
    let root: Value = serde_json::from_str(text)?;
    parse_payload_value(&root)
}

/// Write `payload` as the fallback file, creating parent directories.
pub fn save_fallback(path: &Path, payload: &Value, now: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let wrapper = FallbackFile {
        data: payload.clone(),
        timestamp: now.to_rfc3339(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&wrapper)?)?;
    Ok(())
}
