//! Server records - the normalized shape every data provider produces.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical map label (e.g. `Sever_Map_G1_2_v2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapType(String);

impl MapType {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label used when the source carries no map type.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapType {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for MapType {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// One historical server opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: u32,
    pub opened_at: DateTime<Utc>,
    pub map_type: MapType,
    pub district_id: u32,
}

impl ServerRecord {
    pub fn new(
        id: u32,
        opened_at: DateTime<Utc>,
        map_type: impl Into<MapType>,
        district_id: u32,
    ) -> Self {
        Self {
            id,
            opened_at,
            map_type: map_type.into(),
            district_id,
        }
    }

    pub fn open_date(&self) -> NaiveDate {
        self.opened_at.date_naive()
    }

    /// 0 = Monday .. 6 = Sunday
    pub fn weekday_index(&self) -> u32 {
        self.opened_at.weekday().num_days_from_monday()
    }

    pub fn hour(&self) -> u32 {
        self.opened_at.hour()
    }

    pub fn month(&self) -> u32 {
        self.opened_at.month()
    }

    pub fn year(&self) -> i32 {
        self.opened_at.year()
    }
}

/// Order records by opening time, then id.
pub fn sort_chronologically(records: &mut [ServerRecord]) {
    records.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_unknown_map_type() {
        assert!(MapType::unknown().is_unknown());
        assert!(!MapType::from("Sever_Map_G1_3_v2").is_unknown());
    }

    #[test]
    fn test_sort_chronologically() {
        let t = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let mut records = vec![
            ServerRecord::new(3, t(5), "A", 1),
            ServerRecord::new(1, t(1), "A", 1),
            ServerRecord::new(2, t(1), "B", 1),
        ];
        sort_chronologically(&mut records);
        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_calendar_accessors() {
        // 2024-01-01 is a Monday
        let record = ServerRecord::new(
            1,
            Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap(),
            "A",
            1,
        );
        assert_eq!(record.weekday_index(), 0);
        assert_eq!(record.hour(), 14);
        assert_eq!(record.month(), 1);
        assert_eq!(record.year(), 2024);
    }
}
