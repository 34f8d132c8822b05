//! Conversion between tabular cells and readings.
//!
//! Both backends store the same table: a header row followed by one row per
//! reading. The CSV file and the worksheet only differ in transport, so the
//! row decoding and encoding lives here.

use std::io;
use tracing::{debug, warn};

use crate::models::{parse_timestamp, BloodPressureCategory, Dataset, Reading, Schema};
use super::errors::StoreError;

/// How rows that cannot become readings are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Drop the row and keep going (loading stored data)
    Lenient,
    /// Abort with an import error naming the line (uploaded files)
    Strict,
}

/// Options for turning a table into a dataset
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub mode: DecodeMode,
    /// Ignore stored derived columns and compute them again
    pub recompute: bool,
}

impl DecodeOptions {
    pub fn load(recompute: bool) -> Self {
        Self {
            mode: DecodeMode::Lenient,
            recompute,
        }
    }

    pub fn import() -> Self {
        Self {
            mode: DecodeMode::Strict,
            recompute: true,
        }
    }
}

/// A header row and the data rows below it, all as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Position of every known column in a header
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    timestamp: usize,
    systolic: usize,
    diastolic: usize,
    pulse: Option<usize>,
    notes: Option<usize>,
    category: Option<usize>,
    map: Option<usize>,
    pulse_pressure: Option<usize>,
}

impl ColumnIndex {
    fn from_header(header: &[String]) -> Result<Self, &'static str> {
        let find = |name: &str| header.iter().position(|h| h.trim().trim_matches('\u{feff}') == name);
        Ok(Self {
            timestamp: find("timestamp").ok_or("timestamp")?,
            systolic: find("systolic").ok_or("systolic")?,
            diastolic: find("diastolic").ok_or("diastolic")?,
            pulse: find("pulse"),
            notes: find("notes"),
            category: find("category"),
            map: find("map"),
            pulse_pressure: find("pulse_pressure"),
        })
    }
}

/// Parse a numeric cell holding a whole number ("120" or "120.0")
fn parse_whole(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i32>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= f64::from(i32::MAX) {
        Some(value as i32)
    } else {
        None
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Turn a table into a dataset, normalising types along the way
pub fn decode_table(table: &Table, options: DecodeOptions) -> Result<Dataset, StoreError> {
    if table.header.is_empty() && table.rows.is_empty() {
        return Ok(Dataset::new());
    }

    let columns = ColumnIndex::from_header(&table.header).map_err(|column| match options.mode {
        DecodeMode::Strict => StoreError::ImportParse(format!("missing required column '{}'", column)),
        DecodeMode::Lenient => StoreError::MissingColumn(column),
    })?;

    let mut readings = Vec::with_capacity(table.rows.len());
    let mut dropped = 0usize;

    for (index, row) in table.rows.iter().enumerate() {
        // Header is line 1
        let line = index + 2;
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let timestamp = match parse_timestamp(cell(columns.timestamp)) {
            Some(ts) => ts,
            None => {
                if options.mode == DecodeMode::Strict {
                    return Err(StoreError::ImportParse(format!(
                        "line {}: invalid timestamp '{}'",
                        line,
                        cell(columns.timestamp)
                    )));
                }
                dropped += 1;
                continue;
            }
        };

        let (systolic, diastolic) = match (parse_whole(cell(columns.systolic)), parse_whole(cell(columns.diastolic))) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                if options.mode == DecodeMode::Strict {
                    return Err(StoreError::ImportParse(format!(
                        "line {}: systolic and diastolic must be whole numbers",
                        line
                    )));
                }
                warn!("Dropping row at line {}: systolic/diastolic are not numeric", line);
                dropped += 1;
                continue;
            }
        };

        let raw_pulse = columns.pulse.map(|i| cell(i).trim()).unwrap_or_default();
        let pulse = match parse_whole(raw_pulse) {
            Some(value) => Some(value),
            None if raw_pulse.is_empty() => None,
            None => {
                if options.mode == DecodeMode::Strict {
                    return Err(StoreError::ImportParse(format!(
                        "line {}: pulse must be a whole number",
                        line
                    )));
                }
                debug!("Ignoring pulse '{}' at line {}", raw_pulse, line);
                None
            }
        };
        let notes = columns.notes.map(|i| cell(i).to_string()).unwrap_or_default();

        let mut reading = Reading::new(timestamp, systolic, diastolic, pulse, notes);

        if !options.recompute {
            let category = columns.category.and_then(|i| BloodPressureCategory::from_label(cell(i)));
            let map = columns.map.and_then(|i| parse_decimal(cell(i)));
            let pulse_pressure = columns.pulse_pressure.and_then(|i| parse_whole(cell(i)));

            // Stored values are kept only when all three are usable
            if let (Some(category), Some(map), Some(pulse_pressure)) = (category, map, pulse_pressure) {
                reading.category = category;
                reading.map = map;
                reading.pulse_pressure = pulse_pressure;
                if !reading.has_consistent_derived() {
                    debug!("Stored derived columns at line {} differ from recomputed values", line);
                }
            }
        }

        readings.push(reading);
    }

    if dropped > 0 {
        warn!("Dropped {} rows with unusable timestamp or pressure values", dropped);
    }

    Ok(Dataset::from_readings(readings))
}

/// Render a dataset as a table in schema order
pub fn encode_table(schema: Schema, dataset: &Dataset) -> Table {
    Table {
        header: schema.header(),
        rows: dataset.iter().map(|r| schema.to_row(r)).collect(),
    }
}

/// Read a CSV document into a table
pub fn read_csv<R: io::Read>(reader: R) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = reader
        .headers()?
        .iter()
        .map(|h| h.trim_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { header, rows })
}

/// Write a table as a CSV document
pub fn write_csv<W: io::Write>(writer: W, table: &Table) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialise a dataset to CSV bytes in the local file format
pub fn dataset_to_csv(schema: Schema, dataset: &Dataset) -> Result<Vec<u8>, StoreError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, &encode_table(schema, dataset))?;
    Ok(buffer)
}

/// Parse uploaded CSV bytes, rejecting anything that is not a clean reading table
pub fn dataset_from_csv(bytes: &[u8]) -> Result<Dataset, StoreError> {
    let table = read_csv(bytes).map_err(|e| StoreError::ImportParse(e.to_string()))?;
    if table.header.iter().all(|h| h.is_empty()) {
        return Err(StoreError::ImportParse("file is empty".to_string()));
    }
    decode_table(&table, DecodeOptions::import())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap()
    }

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_decode_normalises_types() {
        let t = table(
            &["timestamp", "systolic", "diastolic", "pulse", "notes", "category", "map", "pulse_pressure"],
            &[
                &["2024-03-01 08:00:00", "120.0", "80", "", "", "Hypertension Stage 1", "93.3", "40"],
                &["not a date", "120", "80", "70", "", "", "", ""],
                &["2024-03-02 08:00:00", "abc", "80", "70", "", "", "", ""],
                &["2024-03-03 08:00:00", "118", "76", "x", "walk"],
            ],
        );

        let dataset = decode_table(&t, DecodeOptions::load(false)).unwrap();
        assert_eq!(dataset.len(), 2);

        let first = &dataset.readings()[0];
        assert_eq!(first.systolic, 120);
        assert_eq!(first.pulse, None);
        assert_eq!(first.map, 93.3);

        let second = &dataset.readings()[1];
        assert_eq!(second.timestamp, ts("2024-03-03 08:00:00"));
        assert_eq!(second.pulse, None);
        assert_eq!(second.notes, "walk");
        assert!(second.has_consistent_derived());
    }

    #[test]
    fn test_decode_keeps_or_recomputes_stored_derived() {
        let t = table(
            &["timestamp", "systolic", "diastolic", "category", "map", "pulse_pressure"],
            &[&["2024-03-01 08:00:00", "118", "76", "Hypertension Stage 2", "1.0", "0"]],
        );

        let kept = decode_table(&t, DecodeOptions::load(false)).unwrap();
        assert_eq!(kept.readings()[0].category, BloodPressureCategory::HypertensionStage2);

        let recomputed = decode_table(&t, DecodeOptions::load(true)).unwrap();
        assert_eq!(recomputed.readings()[0].category, BloodPressureCategory::Normal);
        assert_eq!(recomputed.readings()[0].pulse_pressure, 42);
    }

    #[test]
    fn test_decode_missing_column() {
        let t = table(&["when", "systolic", "diastolic"], &[&["2024-03-01", "120", "80"]]);
        assert!(matches!(
            decode_table(&t, DecodeOptions::load(false)),
            Err(StoreError::MissingColumn("timestamp"))
        ));
        assert!(matches!(
            decode_table(&t, DecodeOptions::import()),
            Err(StoreError::ImportParse(_))
        ));
    }

    #[test]
    fn test_decode_empty_table() {
        let dataset = decode_table(&Table::default(), DecodeOptions::load(false)).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_strict_decode_names_the_line() {
        let t = table(
            &["timestamp", "systolic", "diastolic"],
            &[&["2024-03-01 08:00:00", "120", "80"], &["soon", "120", "80"]],
        );
        let err = decode_table(&t, DecodeOptions::import()).unwrap_err();
        assert!(err.to_string().contains("line 3"), "unexpected message: {}", err);
    }

    #[test]
    fn test_import_rejects_non_numeric_pulse() {
        let err = dataset_from_csv(
            b"timestamp,systolic,diastolic,pulse\n2024-03-01 08:00:00,120,80,70\n2024-03-02 08:00:00,121,79,fast\n",
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::ImportParse(_)));
        assert!(err.to_string().contains("line 3"), "unexpected message: {}", err);

        let blank = dataset_from_csv(b"timestamp,systolic,diastolic,pulse\n2024-03-01 08:00:00,120,80,\n").unwrap();
        assert_eq!(blank.readings()[0].pulse, None);
    }

    #[test]
    fn test_lenient_load_ignores_non_numeric_pulse() {
        let t = table(
            &["timestamp", "systolic", "diastolic", "pulse"],
            &[&["2024-03-01 08:00:00", "120", "80", "fast"]],
        );
        let dataset = decode_table(&t, DecodeOptions::load(true)).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.readings()[0].pulse, None);
    }

    #[test]
    fn test_csv_round_trip_is_stable() {
        let dataset = Dataset::from_readings(vec![
            Reading::new(ts("2024-03-01 08:00:00"), 120, 80, Some(70), "after coffee, seated"),
            Reading::new(ts("2024-03-02 08:00:00"), 140, 90, None, ""),
        ]);
        let schema = Schema::default();

        let first = dataset_to_csv(schema, &dataset).unwrap();
        let reloaded = dataset_from_csv(&first).unwrap();
        let second = dataset_to_csv(schema, &reloaded).unwrap();

        assert_eq!(reloaded, dataset);
        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().starts_with(
            "timestamp,systolic,diastolic,pulse,notes,category,map,pulse_pressure\n"
        ));
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(dataset_from_csv(b""), Err(StoreError::ImportParse(_))));
        assert!(matches!(
            dataset_from_csv(b"timestamp,systolic\n2024-03-01,120\n"),
            Err(StoreError::ImportParse(_))
        ));
    }
}
