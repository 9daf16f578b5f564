//! # Opening Alerts
//!
//! Decides which predicted openings are due for an announcement. An alert
//! is due when the estimated opening lies between `lead_hours` and
//! `lead_hours + window_hours` after `now`, so a check running once an hour
//! catches each server a few times at most; the caller passes back the id
//! it last announced to suppress repeats.
//!
//! Delivery is left to the caller: this module only selects and formats.

use crate::config::AlertConfig;
use crate::models::{MapType, NextServerPrediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub server_id: u32,
    pub estimated_open_time: DateTime<Utc>,
    pub map_type: MapType,
    pub district_id: u32,
    pub confidence: f64,
    /// Hours from the check time to the estimated opening
    pub hours_until: f64,
    pub message: String,
}

fn hours_between(now: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - now).num_seconds() as f64 / 3600.0
}

/// Human readable announcement for one upcoming server.
pub fn format_alert(prediction: &NextServerPrediction, hours_until: f64) -> String {
    format!(
        "Server #{} is expected to open on {} at {} UTC (in about {:.0}h). \
         Map type: {}, district: {}, confidence {:.0}%.",
        prediction.server_id,
        prediction.estimated_open_time.format("%Y-%m-%d"),
        prediction.estimated_open_time.format("%H:%M"),
        hours_until,
        prediction.predicted_map_type,
        prediction.predicted_district_id,
        prediction.confidence * 100.0
    )
}

/// Alerts due at `now`, in prediction order.
///
/// Servers whose id equals `last_notified` are skipped, as is any id
/// already alerted earlier in the same batch.
pub fn due_alerts(
    predictions: &[NextServerPrediction],
    now: DateTime<Utc>,
    config: &AlertConfig,
    last_notified: Option<u32>,
) -> Vec<Alert> {
    let window_end = config.lead_hours + config.window_hours;
    let mut last = last_notified;
    let mut alerts = Vec::new();

    for p in predictions {
        let hours_until = hours_between(now, p.estimated_open_time);
        if hours_until < config.lead_hours || hours_until > window_end {
            continue;
        }
        if last == Some(p.server_id) || alerts.iter().any(|a: &Alert| a.server_id == p.server_id) {
            debug!(server_id = p.server_id, "already announced");
            continue;
        }
        alerts.push(Alert {
            server_id: p.server_id,
            estimated_open_time: p.estimated_open_time,
            map_type: p.predicted_map_type.clone(),
            district_id: p.predicted_district_id,
            confidence: p.confidence,
            hours_until,
            message: format_alert(p, hours_until),
        });
        last = Some(p.server_id);
    }
    alerts
}
