//! Headline dataset statistics for the overview.
//!
//! Besides [`calculate_statistics`] this module holds the map-type and
//! district breakdowns and the year-over-year monthly comparison.

use super::rotation::most_frequent;
use super::time_patterns::WEEKDAY_NAMES;
use crate::models::{MapType, ServerRecord};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_servers: usize,
    pub first_opening: Option<DateTime<Utc>>,
    pub last_opening: Option<DateTime<Utc>>,
    /// Whole days between first and last opening
    pub days_spanned: i64,
    /// `days_spanned / total_servers`, 0 for fewer than two servers
    pub avg_days_per_server: f64,
    pub map_type_count: usize,
    pub most_common_map_type: Option<MapType>,
    pub most_common_weekday: Option<String>,
    /// Busiest (year, month) bucket
    pub max_monthly_servers: usize,
    pub avg_monthly_servers: f64,
}

pub fn calculate_statistics(records: &[ServerRecord]) -> DatasetSummary {
    let first = records.iter().map(|r| r.opened_at).min();
    let last = records.iter().map(|r| r.opened_at).max();
    let days_spanned = match (first, last) {
        (Some(f), Some(l)) => (l - f).num_days(),
        _ => 0,
    };
    let avg_days_per_server = if records.len() > 1 {
        days_spanned as f64 / records.len() as f64
    } else {
        0.0
    };

    let maps: Vec<MapType> = records.iter().map(|r| r.map_type.clone()).collect();
    let distinct: BTreeSet<&MapType> = maps.iter().collect();
    let weekdays: Vec<u32> = records.iter().map(|r| r.weekday_index()).collect();

    let mut monthly: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for r in records {
        *monthly.entry((r.opened_at.year(), r.opened_at.month())).or_insert(0) += 1;
    }
    let avg_monthly_servers = if monthly.is_empty() {
        0.0
    } else {
        records.len() as f64 / monthly.len() as f64
    };

    DatasetSummary {
        total_servers: records.len(),
        first_opening: first,
        last_opening: last,
        days_spanned,
        avg_days_per_server,
        map_type_count: distinct.len(),
        most_common_map_type: most_frequent(&maps).map(|(m, _)| m),
        most_common_weekday: most_frequent(&weekdays)
            .map(|(d, _)| WEEKDAY_NAMES[d as usize % 7].to_string()),
        max_monthly_servers: monthly.values().copied().max().unwrap_or(0),
        avg_monthly_servers,
    }
}

// ============================================================================
// Map type and district breakdowns
// ============================================================================

/// Openings of one map type within one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyMapShare {
    pub year: i32,
    pub map_type: MapType,
    pub count: usize,
    /// `count` over all openings of `year`
    pub share: f64,
}

/// Per-year map-type counts and shares, ordered by year then map type.
pub fn yearly_map_types(records: &[ServerRecord]) -> Vec<YearlyMapShare> {
    let mut counts: BTreeMap<(i32, &MapType), usize> = BTreeMap::new();
    let mut totals: BTreeMap<i32, usize> = BTreeMap::new();
    for r in records {
        *counts.entry((r.year(), &r.map_type)).or_insert(0) += 1;
        *totals.entry(r.year()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|((year, map_type), count)| YearlyMapShare {
            year,
            map_type: map_type.clone(),
            count,
            share: count as f64 / totals[&year] as f64,
        })
        .collect()
}

/// Openings per district, ordered by district id.
pub fn district_counts(records: &[ServerRecord]) -> Vec<(u32, usize)> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.district_id).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

/// District by map type contingency table with margins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictMapTable {
    pub map_types: Vec<MapType>,
    /// One row per district: `(district_id, counts aligned to map_types)`
    pub rows: Vec<(u32, Vec<usize>)>,
    /// Column totals aligned to `map_types`
    pub map_totals: Vec<usize>,
    pub total: usize,
}

impl DistrictMapTable {
    pub fn row_total(&self, district_id: u32) -> Option<usize> {
        self.rows
            .iter()
            .find(|(d, _)| *d == district_id)
            .map(|(_, counts)| counts.iter().sum())
    }
}

pub fn district_map_crosstab(records: &[ServerRecord]) -> DistrictMapTable {
    let map_types: Vec<MapType> = records
        .iter()
        .map(|r| &r.map_type)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let column = |map: &MapType| map_types.binary_search(map).ok();

    let mut rows: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    let mut map_totals = vec![0; map_types.len()];
    for r in records {
        let Some(col) = column(&r.map_type) else { continue };
        rows.entry(r.district_id).or_insert_with(|| vec![0; map_types.len()])[col] += 1;
        map_totals[col] += 1;
    }

    DistrictMapTable {
        map_types,
        rows: rows.into_iter().collect(),
        map_totals,
        total: records.len(),
    }
}

// ============================================================================
// Year over year
// ============================================================================

/// Openings in one calendar month across years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthComparison {
    pub month: u32,
    /// `(year, openings)` for every year in the data, zero-filled
    pub counts: Vec<(i32, usize)>,
    /// Percent change of the latest year over the one before; `None` when
    /// there is no earlier year or it had no openings in this month
    pub yoy_change_pct: Option<f64>,
}

/// Month-by-year opening counts with the latest year-over-year change.
///
/// Only months with at least one opening in any year are listed.
pub fn year_over_year(records: &[ServerRecord]) -> Vec<MonthComparison> {
    let years: BTreeSet<i32> = records.iter().map(|r| r.year()).collect();
    let mut table: BTreeMap<u32, BTreeMap<i32, usize>> = BTreeMap::new();
    for r in records {
        *table.entry(r.month()).or_default().entry(r.year()).or_insert(0) += 1;
    }

    table
        .into_iter()
        .map(|(month, by_year)| {
            let counts: Vec<(i32, usize)> = years
                .iter()
                .map(|y| (*y, by_year.get(y).copied().unwrap_or(0)))
                .collect();
            let yoy_change_pct = match counts.as_slice() {
                [.., (_, prev), (_, cur)] if *prev > 0 => {
                    Some((*cur as f64 - *prev as f64) / *prev as f64 * 100.0)
                }
                _ => None,
            };
            MonthComparison {
                month,
                counts,
                yoy_change_pct,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_statistics() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let records: Vec<ServerRecord> = (0..10)
            .map(|i| {
                let map = if i % 3 == 2 { "Secluded" } else { "Continuous" };
                ServerRecord::new(i + 1, start + Duration::days(7 * i as i64), map, 1)
            })
            .collect();
        let stats = calculate_statistics(&records);

        assert_eq!(stats.total_servers, 10);
        assert_eq!(stats.days_spanned, 63);
        assert!((stats.avg_days_per_server - 6.3).abs() < 1e-12);
        assert_eq!(stats.map_type_count, 2);
        assert_eq!(stats.most_common_map_type, Some(MapType::new("Continuous")));
        assert_eq!(stats.most_common_weekday.as_deref(), Some("Monday"));
        // January holds 5 openings, February 4, March 1
        assert_eq!(stats.max_monthly_servers, 5);
        assert!((stats.avg_monthly_servers - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_dataset() {
        let stats = calculate_statistics(&[]);
        assert_eq!(stats.total_servers, 0);
        assert_eq!(stats.first_opening, None);
        assert_eq!(stats.most_common_map_type, None);
        assert_eq!(stats.avg_monthly_servers, 0.0);
    }

    fn record(id: u32, date: (i32, u32, u32), map: &str, district: u32) -> ServerRecord {
        let at = Utc.with_ymd_and_hms(date.0, date.1, date.2, 12, 0, 0).unwrap();
        ServerRecord::new(id, at, map, district)
    }

    fn mixed() -> Vec<ServerRecord> {
        vec![
            record(1, (2023, 3, 1), "A", 1),
            record(2, (2023, 3, 15), "B", 1),
            record(3, (2023, 5, 1), "A", 2),
            record(4, (2024, 3, 2), "A", 2),
            record(5, (2024, 3, 9), "A", 2),
            record(6, (2024, 3, 16), "B", 3),
            record(7, (2024, 6, 1), "B", 3),
            record(8, (2024, 6, 8), "A", 3),
        ]
    }

    #[test]
    fn test_yearly_map_types() {
        let shares = yearly_map_types(&mixed());
        let summary: Vec<(i32, &str, usize)> = shares
            .iter()
            .map(|s| (s.year, s.map_type.as_str(), s.count))
            .collect();
        assert_eq!(
            summary,
            vec![(2023, "A", 2), (2023, "B", 1), (2024, "A", 3), (2024, "B", 2)]
        );
        assert!((shares[0].share - 2.0 / 3.0).abs() < 1e-12);
        assert!((shares[3].share - 0.4).abs() < 1e-12);

        for year in [2023, 2024] {
            let total: f64 = shares.iter().filter(|s| s.year == year).map(|s| s.share).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_district_breakdowns() {
        let records = mixed();
        assert_eq!(district_counts(&records), vec![(1, 2), (2, 3), (3, 3)]);

        let table = district_map_crosstab(&records);
        assert_eq!(table.map_types, vec![MapType::new("A"), MapType::new("B")]);
        assert_eq!(table.rows, vec![(1, vec![1, 1]), (2, vec![3, 0]), (3, vec![1, 2])]);
        assert_eq!(table.map_totals, vec![5, 3]);
        assert_eq!(table.total, 8);
        assert_eq!(table.row_total(3), Some(3));
        assert_eq!(table.row_total(9), None);
    }

    #[test]
    fn test_year_over_year() {
        let months = year_over_year(&mixed());
        let listed: Vec<u32> = months.iter().map(|m| m.month).collect();
        assert_eq!(listed, vec![3, 5, 6]);

        // March: 2 openings in 2023, 3 in 2024
        assert_eq!(months[0].counts, vec![(2023, 2), (2024, 3)]);
        assert!((months[0].yoy_change_pct.unwrap() - 50.0).abs() < 1e-12);
        // May had openings only in 2023
        assert_eq!(months[1].counts, vec![(2023, 1), (2024, 0)]);
        assert!((months[1].yoy_change_pct.unwrap() + 100.0).abs() < 1e-12);
        // June has no 2023 baseline
        assert_eq!(months[2].yoy_change_pct, None);
    }

    #[test]
    fn test_single_year_has_no_change() {
        let records = vec![record(1, (2024, 1, 1), "A", 1)];
        let months = year_over_year(&records);
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].yoy_change_pct, None);
        assert!(district_map_crosstab(&[]).rows.is_empty());
    }
}
