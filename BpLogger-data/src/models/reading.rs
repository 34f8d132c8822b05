use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::metrics::{categorize, derive, BloodPressureCategory};

/// Format used for the `timestamp` column in every backend
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Accepted timestamp layouts when reading stored or imported data
const TIMESTAMP_LAYOUTS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Storage model for a blood pressure reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the reading was taken (local wall clock)
    pub timestamp: NaiveDateTime,

    /// Systolic blood pressure (the higher number)
    pub systolic: i32,

    /// Diastolic blood pressure (the lower number)
    pub diastolic: i32,

    /// Optional pulse rate in beats per minute
    pub pulse: Option<i32>,

    /// Free-text notes, empty when none were given
    pub notes: String,

    /// Derived category
    pub category: BloodPressureCategory,

    /// Derived mean arterial pressure
    pub map: f64,

    /// Derived pulse pressure
    pub pulse_pressure: i32,
}

/// Hashable identity of a row: every column, `map` compared bit for bit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    timestamp: NaiveDateTime,
    systolic: i32,
    diastolic: i32,
    pulse: Option<i32>,
    notes: String,
    category: BloodPressureCategory,
    map: u64,
    pulse_pressure: i32,
}

impl Reading {
    /// Build a complete reading, computing the derived columns
    pub fn new(
        timestamp: NaiveDateTime,
        systolic: i32,
        diastolic: i32,
        pulse: Option<i32>,
        notes: impl Into<String>,
    ) -> Self {
        let mut reading = Self {
            timestamp,
            systolic,
            diastolic,
            pulse,
            notes: notes.into(),
            category: BloodPressureCategory::Uncategorized,
            map: 0.0,
            pulse_pressure: 0,
        };
        reading.recompute_derived();
        reading
    }

    /// Overwrite category, map and pulse pressure from systolic/diastolic.
    ///
    /// This is the only place derived columns are computed.
    pub fn recompute_derived(&mut self) {
        let metrics = derive(self.systolic, self.diastolic);
        self.category = categorize(self.systolic, self.diastolic);
        self.map = metrics.map;
        self.pulse_pressure = metrics.pulse_pressure;
    }

    /// Whether the stored derived columns match a fresh computation
    pub fn has_consistent_derived(&self) -> bool {
        let metrics = derive(self.systolic, self.diastolic);
        self.category == categorize(self.systolic, self.diastolic)
            && self.map == metrics.map
            && self.pulse_pressure == metrics.pulse_pressure
    }

    /// Timestamp rendered the way it is stored
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    fn row_key(&self) -> RowKey {
        RowKey {
            timestamp: self.timestamp,
            systolic: self.systolic,
            diastolic: self.diastolic,
            pulse: self.pulse,
            notes: self.notes.clone(),
            category: self.category,
            map: self.map.to_bits(),
            pulse_pressure: self.pulse_pressure,
        }
    }
}

/// Parse a stored or imported timestamp cell
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for layout in TIMESTAMP_LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Ordered collection of readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    readings: Vec<Reading>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap readings as they are, without sorting
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self { readings }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    /// Stable sort, oldest first
    pub fn sort_by_timestamp(&mut self) {
        self.readings.sort_by_key(|r| r.timestamp);
    }

    pub fn recompute_derived(&mut self) {
        self.readings.iter_mut().for_each(Reading::recompute_derived);
    }

    /// Whether any reading carries a pulse value
    pub fn has_pulse(&self) -> bool {
        self.readings.iter().any(|r| r.pulse.is_some())
    }

    /// Union of both datasets without exact duplicate rows, oldest first.
    ///
    /// The first occurrence of a duplicated row is kept.
    pub fn merge(&self, incoming: &Dataset) -> Dataset {
        let mut seen = HashSet::new();
        let mut merged: Vec<Reading> = self
            .readings
            .iter()
            .chain(incoming.readings.iter())
            .filter(|reading| seen.insert(reading.row_key()))
            .cloned()
            .collect();
        merged.sort_by_key(|r| r.timestamp);

        Dataset { readings: merged }
    }

    /// Newest readings first, at most `limit` of them
    pub fn recent(&self, limit: usize) -> Vec<&Reading> {
        let mut readings: Vec<&Reading> = self.readings.iter().collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        readings.truncate(limit);
        readings
    }
}

impl IntoIterator for Dataset {
    type Item = Reading;
    type IntoIter = std::vec::IntoIter<Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}

impl FromIterator<Reading> for Dataset {
    fn from_iter<T: IntoIterator<Item = Reading>>(iter: T) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}

/// Column layout shared by the CSV file and the worksheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    /// Whether the `pulse` column is part of the layout
    pub track_pulse: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self { track_pulse: true }
    }
}

impl Schema {
    pub fn new(track_pulse: bool) -> Self {
        Self { track_pulse }
    }

    /// Canonical column names in order
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["timestamp", "systolic", "diastolic"];
        if self.track_pulse {
            columns.push("pulse");
        }
        columns.extend(["notes", "category", "map", "pulse_pressure"]);
        columns
    }

    /// Header row as owned strings
    pub fn header(&self) -> Vec<String> {
        self.columns().into_iter().map(str::to_string).collect()
    }

    /// Render one reading as a row of cells in column order
    pub fn to_row(&self, reading: &Reading) -> Vec<String> {
        let mut row = vec![
            reading.formatted_timestamp(),
            reading.systolic.to_string(),
            reading.diastolic.to_string(),
        ];
        if self.track_pulse {
            row.push(reading.pulse.map(|p| p.to_string()).unwrap_or_default());
        }
        row.extend([
            reading.notes.clone(),
            reading.category.label().to_string(),
            format!("{:.1}", reading.map),
            reading.pulse_pressure.to_string(),
        ]);
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_new_reading_computes_derived() {
        let reading = Reading::new(ts("2024-03-01 08:00:00"), 120, 80, Some(70), "");
        assert_eq!(reading.category, BloodPressureCategory::HypertensionStage1);
        assert_eq!(reading.pulse_pressure, 40);
        assert_eq!(reading.map, 93.3);
        assert!(reading.has_consistent_derived());
    }

    #[test]
    fn test_recompute_fixes_drifted_values() {
        let mut reading = Reading::new(ts("2024-03-01 08:00:00"), 118, 76, None, "");
        reading.category = BloodPressureCategory::HypertensionStage2;
        reading.map = 1.0;
        assert!(!reading.has_consistent_derived());

        reading.recompute_derived();
        assert_eq!(reading.category, BloodPressureCategory::Normal);
        assert!(reading.has_consistent_derived());
    }

    #[test]
    fn test_parse_timestamp_layouts() {
        let expected = ts("2024-03-01 08:30:00");
        assert_eq!(parse_timestamp("2024-03-01 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-03-01T08:30:00 "), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 08:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T08:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01"), Some(ts("2024-03-01 00:00:00")));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_merge_dedups_and_sorts() {
        let a = Reading::new(ts("2024-03-02 08:00:00"), 120, 80, Some(70), "");
        let b = Reading::new(ts("2024-03-01 08:00:00"), 130, 85, None, "coffee");
        let c = Reading::new(ts("2024-03-03 08:00:00"), 110, 70, Some(60), "");

        let left = Dataset::from_readings(vec![a.clone(), b.clone()]);
        let right = Dataset::from_readings(vec![b.clone(), c.clone()]);

        let merged = left.merge(&right);
        assert_eq!(merged.readings(), &[b.clone(), a.clone(), c.clone()]);

        let reversed = right.merge(&left);
        assert_eq!(merged.len(), reversed.len());
        assert!(merged.iter().all(|r| reversed.readings().contains(r)));

        assert_eq!(left.merge(&left).len(), 2);
    }

    #[test]
    fn test_merge_keeps_rows_that_differ_in_one_column() {
        let a = Reading::new(ts("2024-03-02 08:00:00"), 120, 80, Some(70), "");
        let b = Reading::new(ts("2024-03-02 08:00:00"), 120, 80, Some(70), "after walk");

        let merged = Dataset::from_readings(vec![a]).merge(&Dataset::from_readings(vec![b]));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let dataset: Dataset = (1..=5)
            .map(|day| Reading::new(ts(&format!("2024-03-0{day} 08:00:00")), 120, 80, None, ""))
            .collect();

        let recent = dataset.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].timestamp, ts("2024-03-05 08:00:00"));
        assert_eq!(recent[2].timestamp, ts("2024-03-03 08:00:00"));
    }

    #[test]
    fn test_schema_columns() {
        assert_eq!(
            Schema::new(true).columns(),
            vec!["timestamp", "systolic", "diastolic", "pulse", "notes", "category", "map", "pulse_pressure"]
        );
        assert!(!Schema::new(false).columns().contains(&"pulse"));
    }

    #[test]
    fn test_schema_to_row() {
        let reading = Reading::new(ts("2024-03-01 08:00:00"), 140, 90, None, "left arm");
        let row = Schema::new(true).to_row(&reading);
        assert_eq!(
            row,
            vec!["2024-03-01 08:00:00", "140", "90", "", "left arm", "Hypertension Stage 2", "106.7", "50"]
        );
    }
}
