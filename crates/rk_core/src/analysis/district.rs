//! # District Predictor
//!
//! Three independent signals vote on the district of an upcoming server:
//!
//! - **co-occurrence**: the district most often paired with the predicted
//!   map type
//! - **progression**: the district cycle over server ids, or the linear
//!   district-vs-id trend when no cycle exists
//! - **correlation**: the district seen at the same phase of the map-type
//!   rotation, or the latest pairing for the map type when map type and
//!   district are associated strongly enough
//!
//! Confidence is the share of signals agreeing with the winner. The
//! predictor never fails; missing evidence shows up as low confidence.

use super::rotation::{detect_rotation, most_frequent};
use super::stats::linear_fit;
use crate::config::AnalysisConfig;
use crate::error::ForecastError;
use crate::models::{DistrictPrediction, DistrictSignals, MapType, RotationPattern, ServerRecord};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const SIGNAL_COUNT: f64 = 3.0;

/// Most common positive step between consecutive server ids and its share.
///
/// Ties go to the smaller step.
pub fn modal_id_step(records: &[ServerRecord]) -> Option<(u32, f64)> {
    let mut ids: Vec<u32> = records.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for pair in ids.windows(2) {
        *counts.entry(pair[1] - pair[0]).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    let mut best: Option<(u32, usize)> = None;
    for (&step, &count) in &counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((step, count));
        }
    }
    best.map(|(step, count)| (step, count as f64 / total as f64))
}

/// How many servers past the latest id `target_id` lies (at least 1).
pub fn steps_ahead(records: &[ServerRecord], target_id: u32) -> usize {
    let Some(last_id) = records.iter().map(|r| r.id).max() else {
        return 1;
    };
    if target_id <= last_id {
        return 1;
    }
    let step = modal_id_step(records).map_or(1, |(s, _)| s.max(1));
    let ahead = ((target_id - last_id) as f64 / step as f64).round() as usize;
    ahead.max(1)
}

/// Cramér's V between map type and district; 0 when either has one level.
pub fn cramers_v(records: &[ServerRecord]) -> f64 {
    let mut table: BTreeMap<(&MapType, u32), f64> = BTreeMap::new();
    let mut rows: BTreeMap<&MapType, f64> = BTreeMap::new();
    let mut cols: BTreeMap<u32, f64> = BTreeMap::new();
    for r in records {
        *table.entry((&r.map_type, r.district_id)).or_insert(0.0) += 1.0;
        *rows.entry(&r.map_type).or_insert(0.0) += 1.0;
        *cols.entry(r.district_id).or_insert(0.0) += 1.0;
    }

    let k = rows.len().min(cols.len());
    if k < 2 {
        return 0.0;
    }
    let n = records.len() as f64;
    let mut chi2 = 0.0;
    for (map, row_total) in &rows {
        for (district, col_total) in &cols {
            let expected = row_total * col_total / n;
            let observed = table.get(&(*map, *district)).copied().unwrap_or(0.0);
            chi2 += (observed - expected).powi(2) / expected;
        }
    }
    (chi2 / (n * (k - 1) as f64)).sqrt().min(1.0)
}

fn co_occurrence(records: &[ServerRecord], map: &MapType) -> Option<u32> {
    let districts: Vec<u32> = records
        .iter()
        .filter(|r| &r.map_type == map)
        .map(|r| r.district_id)
        .collect();
    most_frequent(&districts).map(|(d, _)| d)
}

fn progression(records: &[ServerRecord], ahead: usize, target_id: u32, config: &AnalysisConfig) -> Option<u32> {
    let mut by_id: Vec<&ServerRecord> = records.iter().collect();
    by_id.sort_by_key(|r| r.id);
    let districts: Vec<u32> = by_id.iter().map(|r| r.district_id).collect();

    if let Ok(pattern) = detect_rotation(&districts, &config.rotation) {
        return Some(*pattern.predict_nth(ahead));
    }

    let x: Vec<f64> = by_id.iter().map(|r| r.id as f64).collect();
    let y: Vec<f64> = districts.iter().map(|&d| d as f64).collect();
    let (intercept, slope) = linear_fit(&x, &y)?;
    let lo = districts.iter().min().copied()? as f64;
    let hi = districts.iter().max().copied()? as f64;
    let estimate = (intercept + slope * target_id as f64).round();
    if !estimate.is_finite() {
        return None;
    }
    // The trend may reach one district past the highest seen so far
    Some(estimate.clamp(lo, hi + 1.0) as u32)
}

fn correlation(
    records: &[ServerRecord],
    map: &MapType,
    ahead: usize,
    map_pattern: Option<&RotationPattern<MapType>>,
    config: &AnalysisConfig,
) -> Option<u32> {
    if let Some(pattern) = map_pattern {
        let period = pattern.period_length;
        let offset = records.len().checked_sub(period)?;
        let phase = (ahead - 1) % period;
        let districts: Vec<u32> = records
            .iter()
            .enumerate()
            .filter(|(i, r)| {
                (*i as isize - offset as isize).rem_euclid(period as isize) as usize == phase
                    && &r.map_type == map
            })
            .map(|(_, r)| r.district_id)
            .collect();
        return most_frequent(&districts).map(|(d, _)| d);
    }

    let strength = cramers_v(records);
    debug!(cramers_v = strength, "map/district association");
    if strength < config.district.min_correlation {
        return None;
    }
    records
        .iter()
        .rev()
        .find(|r| &r.map_type == map)
        .map(|r| r.district_id)
}

/// Majority district; ties go to the co-occurrence signal, then the
/// earlier signal.
fn vote(signals: &DistrictSignals) -> Option<(u32, usize)> {
    let votes = signals.votes();
    let mut tally: BTreeMap<u32, usize> = BTreeMap::new();
    for district in votes.iter().flatten() {
        *tally.entry(*district).or_insert(0) += 1;
    }
    let top = tally.values().copied().max()?;
    votes
        .iter()
        .flatten()
        .find(|d| tally.get(*d) == Some(&top))
        .map(|&d| (d, top))
}

/// Predict the district of server `target_id` given its predicted map type.
///
/// `history` must be sorted chronologically.
pub fn predict_district(
    history: &[ServerRecord],
    predicted_map: &MapType,
    target_id: u32,
    map_pattern: Option<&RotationPattern<MapType>>,
    config: &AnalysisConfig,
) -> DistrictPrediction {
    let Some(last) = history.last() else {
        return DistrictPrediction {
            server_id: target_id,
            predicted_district_id: 0,
            confidence: 0.0,
            signals: DistrictSignals::default(),
        };
    };

    let records = match config.district.window {
        Some(w) if w < history.len() => &history[history.len() - w..],
        _ => history,
    };
    let ahead = steps_ahead(history, target_id);

    let signals = DistrictSignals {
        co_occurrence: co_occurrence(records, predicted_map),
        progression: progression(records, ahead, target_id, config),
        correlation: correlation(history, predicted_map, ahead, map_pattern, config),
    };
    debug!(server_id = target_id, ?signals, "district signals");

    match vote(&signals) {
        Some((district, agreeing)) => DistrictPrediction {
            server_id: target_id,
            predicted_district_id: district,
            confidence: agreeing as f64 / SIGNAL_COUNT,
            signals,
        },
        None => {
            let err = ForecastError::PredictionUnavailable(format!(
                "no district signal for server {target_id}"
            ));
            warn!(error = %err, fallback = last.district_id, "using last known district");
            DistrictPrediction {
                server_id: target_id,
                predicted_district_id: last.district_id,
                confidence: 1.0 / SIGNAL_COUNT,
                signals,
            }
        }
    }
}
