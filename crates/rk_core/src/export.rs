//! Tabular (CSV) and JSON export of analysis results.

use crate::error::Result;
use crate::models::{ForecastResult, NextServerPrediction, TimeSeries};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub bucket: NaiveDate,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRow {
    pub bucket: NaiveDate,
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextServerRow {
    pub server_id: u32,
    pub estimated_open_time: DateTime<Utc>,
    pub map_type: String,
    pub district_id: u32,
    pub confidence: f64,
    pub countdown: String,
}

pub fn series_rows(series: &TimeSeries) -> Vec<SeriesRow> {
    series
        .points
        .iter()
        .map(|p| SeriesRow {
            bucket: p.bucket,
            count: p.count,
        })
        .collect()
}

pub fn forecast_rows(result: &ForecastResult) -> Vec<ForecastRow> {
    result
        .points
        .iter()
        .map(|p| ForecastRow {
            bucket: p.bucket,
            forecast: p.value,
            lower: p.lower,
            upper: p.upper,
        })
        .collect()
}

pub fn next_server_rows(predictions: &[NextServerPrediction]) -> Vec<NextServerRow> {
    predictions
        .iter()
        .map(|p| NextServerRow {
            server_id: p.server_id,
            estimated_open_time: p.estimated_open_time,
            map_type: p.predicted_map_type.to_string(),
            district_id: p.predicted_district_id,
            confidence: p.confidence,
            countdown: p.countdown_label(),
        })
        .collect()
}

/// Write `rows` as CSV with a header row.
pub fn write_csv<W: Write, R: Serialize>(writer: W, rows: &[R]) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Granularity;

    #[test]
    fn test_series_csv() {
        let series = TimeSeries::from_values(
            Granularity::Month,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &[3.0, 0.0],
        );
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &series_rows(&series)).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "bucket,count\n2024-01-01,3.0\n2024-02-01,0.0\n");
    }

    #[test]
    fn test_json_export() {
        let series = TimeSeries::from_values(
            Granularity::Day,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &[1.0],
        );
        let json = to_json_pretty(&series).unwrap();
        assert!(json.contains("\"granularity\": \"day\""));
    }

    #[test]
    fn test_csv_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let rows = vec![ForecastRow {
            bucket: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            forecast: 0.5,
            lower: 0.0,
            upper: 1.5,
        }];
        write_csv(file.reopen().unwrap(), &rows).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("bucket,forecast,lower,upper\n"));
        assert!(text.contains("2024-01-02,0.5,0.0,1.5"));
    }
}
