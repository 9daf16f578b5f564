//! # Rotation Pattern Detector
//!
//! Finds a repeating unit in a label sequence (map types, districts) and
//! projects it forward.
//!
//! ## Scoring
//!
//! For a candidate period `L` the unit is the last `L` labels. Every earlier
//! position is compared with the unit element at the same phase, counted
//! backwards from the end of the history:
//!
//! ```text
//! history: A B C A B C A B C A
//! unit:                  B C A   (L = 3)
//! phase:   2 0 1 2 0 1 2 . . .
//! ```
//!
//! The consistency score is the share of matching comparisons. A period is
//! only scored when at least one full earlier period is available.
//!
//! ## Selection
//!
//! Highest score wins, ties go to the shorter period, and the winner must be
//! strictly above the configured threshold.

use crate::config::RotationConfig;
use crate::error::{ForecastError, Result};
use crate::models::{MapType, RotationPattern};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hash;
use tracing::debug;

/// Score of a single candidate period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub period: usize,
    pub matches: usize,
    pub compared: usize,
    pub score: f64,
}

/// How a label forecast was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMethod {
    Rotation,
    /// Most frequent recent label
    Frequency,
}

/// Next labels of a sequence with the evidence behind them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelForecast<T> {
    pub labels: Vec<T>,
    pub pattern: Option<RotationPattern<T>>,
    pub confidence: f64,
    pub method: LabelMethod,
}

pub type MapTypeForecast = LabelForecast<MapType>;

/// Consistency of `history` with period `period`.
pub fn consistency<T: PartialEq>(history: &[T], period: usize) -> Option<CandidateScore> {
    let n = history.len();
    if period == 0 || n < 2 * period {
        return None;
    }
    let offset = n - period;
    let unit = &history[offset..];

    let matches = history[..offset]
        .iter()
        .enumerate()
        .filter(|(i, label)| {
            let phase = (*i as isize - offset as isize).rem_euclid(period as isize) as usize;
            **label == unit[phase]
        })
        .count();

    Some(CandidateScore {
        period,
        matches,
        compared: offset,
        score: matches as f64 / offset as f64,
    })
}

fn recent<T>(history: &[T], window: Option<usize>) -> &[T] {
    match window {
        Some(w) if w < history.len() => &history[history.len() - w..],
        _ => history,
    }
}

/// Best rotation in the configured window, or `PatternNotFound`.
pub fn detect_rotation<T>(history: &[T], config: &RotationConfig) -> Result<RotationPattern<T>>
where
    T: Clone + PartialEq,
{
    let scanned = recent(history, config.window);

    let mut best: Option<CandidateScore> = None;
    for period in config.min_period..=config.max_period {
        let Some(candidate) = consistency(scanned, period) else {
            continue;
        };
        debug!(
            period,
            score = candidate.score,
            compared = candidate.compared,
            "rotation candidate"
        );
        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }

    match best {
        Some(b) if b.score > config.threshold => Ok(RotationPattern {
            period_length: b.period,
            sequence: scanned[scanned.len() - b.period..].to_vec(),
            consistency_score: b.score,
            compared: b.compared,
        }),
        other => Err(ForecastError::PatternNotFound {
            best_score: other.map_or(0.0, |b| b.score),
        }),
    }
}

/// Most frequent label and its share; ties go to the most recent occurrence.
pub fn most_frequent<T>(labels: &[T]) -> Option<(T, f64)>
where
    T: Clone + Eq + Hash,
{
    let mut stats: FxHashMap<&T, (usize, usize)> = FxHashMap::default();
    for (i, label) in labels.iter().enumerate() {
        let entry = stats.entry(label).or_insert((0, i));
        entry.0 += 1;
        entry.1 = i;
    }
    stats
        .into_iter()
        .max_by_key(|(_, (count, last))| (*count, *last))
        .map(|(label, (count, _))| (label.clone(), count as f64 / labels.len() as f64))
}

/// Next `n` labels: rotation when one is found, frequency otherwise.
pub fn predict_labels<T>(history: &[T], n: usize, config: &RotationConfig) -> Result<LabelForecast<T>>
where
    T: Clone + Eq + Hash,
{
    match detect_rotation(history, config) {
        Ok(pattern) => Ok(LabelForecast {
            labels: pattern.predict_next(n),
            confidence: pattern.consistency_score,
            pattern: Some(pattern),
            method: LabelMethod::Rotation,
        }),
        Err(ForecastError::PatternNotFound { best_score }) => {
            let window = recent(history, Some(config.frequency_window));
            let (label, share) = most_frequent(window)
                .ok_or_else(|| ForecastError::insufficient("label history", 1, 0))?;
            debug!(best_score, share, "no rotation, using most frequent label");
            Ok(LabelForecast {
                labels: vec![label; n],
                pattern: None,
                confidence: share,
                method: LabelMethod::Frequency,
            })
        }
        Err(err) => Err(err),
    }
}

/// Map types of the next `n` servers.
pub fn predict_map_types(history: &[MapType], n: usize, config: &RotationConfig) -> Result<MapTypeForecast> {
    predict_labels(history, n, config)
}

// ============================================================================
// Transition analysis
// ============================================================================

/// First-order label transition counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix<T: Ord> {
    pub counts: BTreeMap<T, BTreeMap<T, usize>>,
}

impl<T: Ord + Clone> TransitionMatrix<T> {
    /// Observed probability of `to` following `from`.
    pub fn probability(&self, from: &T, to: &T) -> f64 {
        let Some(row) = self.counts.get(from) else {
            return 0.0;
        };
        let total: usize = row.values().sum();
        if total == 0 {
            return 0.0;
        }
        row.get(to).copied().unwrap_or(0) as f64 / total as f64
    }

    /// Most likely successor of `label` (smallest label on ties).
    pub fn most_likely_next(&self, label: &T) -> Option<(T, f64)> {
        let row = self.counts.get(label)?;
        let total: usize = row.values().sum();
        let mut best: Option<(&T, usize)> = None;
        for (next, &count) in row {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((next, count));
            }
        }
        best.map(|(next, count)| (next.clone(), count as f64 / total as f64))
    }
}

pub fn transition_matrix<T: Ord + Clone>(history: &[T]) -> TransitionMatrix<T> {
    let mut counts: BTreeMap<T, BTreeMap<T, usize>> = BTreeMap::new();
    for pair in history.windows(2) {
        *counts
            .entry(pair[0].clone())
            .or_default()
            .entry(pair[1].clone())
            .or_insert(0) += 1;
    }
    TransitionMatrix { counts }
}

/// Per-position majority pattern anchored at the start of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCompliance<T> {
    pub period: usize,
    pub pattern: Vec<T>,
    /// Share of history positions matching the majority pattern
    pub compliance: f64,
}

pub fn pattern_compliance<T: Ord + Clone>(history: &[T], period: usize) -> Option<PatternCompliance<T>> {
    if period == 0 || history.len() < period {
        return None;
    }

    let mut pattern = Vec::with_capacity(period);
    for phase in 0..period {
        let mut counts: BTreeMap<&T, usize> = BTreeMap::new();
        for label in history.iter().skip(phase).step_by(period) {
            *counts.entry(label).or_insert(0) += 1;
        }
        let mut best: Option<(&T, usize)> = None;
        for (label, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((label, count));
            }
        }
        pattern.push(best?.0.clone());
    }

    let matches = history
        .iter()
        .enumerate()
        .filter(|(i, label)| **label == pattern[i % period])
        .count();

    Some(PatternCompliance {
        period,
        pattern,
        compliance: matches as f64 / history.len() as f64,
    })
}
