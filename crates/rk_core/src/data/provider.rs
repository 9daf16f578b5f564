//! Record sources behind one trait, chosen once at startup.

use super::payload::parse_api_payload;
use crate::error::{ForecastError, Result};
use crate::models::{sort_chronologically, MapType, ServerRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SAMPLE_PAYLOAD: &str = include_str!("../../data/sample_servers.json");

/// A source of historical server records.
pub trait DataProvider {
    fn name(&self) -> &str;

    /// All records, sorted chronologically.
    fn fetch(&self) -> Result<Vec<ServerRecord>>;
}

// ============================================================================
// File providers
// ============================================================================

/// Fallback file written by a previous successful live fetch.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataProvider for JsonFileProvider {
    fn name(&self) -> &str {
        "fallback-file"
    }

    fn fetch(&self) -> Result<Vec<ServerRecord>> {
        let text = std::fs::read_to_string(&self.path)?;
        parse_api_payload(&text)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "ServerId")]
    server_id: u32,
    #[serde(rename = "OpenTime")]
    open_time: i64,
    #[serde(rename = "MapType", default)]
    map_type: Option<String>,
    #[serde(rename = "DistrictId")]
    district_id: u32,
}

/// Local CSV export with `ServerId,OpenTime,MapType,DistrictId` columns.
///
/// Extra columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
}

impl CsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self) -> Result<Vec<ServerRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row?;
            let opened_at = DateTime::<Utc>::from_timestamp(row.open_time, 0).ok_or_else(|| {
                ForecastError::Schema(format!("row {}: OpenTime {} out of range", line + 2, row.open_time))
            })?;
            let map_type = row
                .map_type
                .filter(|m| !m.is_empty())
                .map_or_else(MapType::unknown, MapType::new);
            records.push(ServerRecord::new(row.server_id, opened_at, map_type, row.district_id));
        }
        if records.is_empty() {
            return Err(ForecastError::Schema(format!(
                "{} contains no server rows",
                self.path.display()
            )));
        }
        sort_chronologically(&mut records);
        Ok(records)
    }
}

/// Small embedded dataset so the tool works without network or files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleProvider;

impl DataProvider for SampleProvider {
    fn name(&self) -> &str {
        "sample"
    }

    fn fetch(&self) -> Result<Vec<ServerRecord>> {
        parse_api_payload(SAMPLE_PAYLOAD)
    }
}

// ============================================================================
// Chain
// ============================================================================

/// Tries providers in order and returns the first success.
#[derive(Default)]
pub struct ProviderChain {
    providers: Vec<Box<dyn DataProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl DataProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn push(&mut self, provider: Box<dyn DataProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Records and the name of the provider that produced them.
    pub fn fetch_with_source(&self) -> Result<(String, Vec<ServerRecord>)> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.fetch() {
                Ok(records) => {
                    info!(source = provider.name(), records = records.len(), "records loaded");
                    return Ok((provider.name().to_string(), records));
                }
                Err(err) => {
                    warn!(source = provider.name(), error = %err, "provider failed, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ForecastError::Config("no data provider configured".to_string())))
    }
}

impl DataProvider for ProviderChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn fetch(&self) -> Result<Vec<ServerRecord>> {
        self.fetch_with_source().map(|(_, records)| records)
    }
}
