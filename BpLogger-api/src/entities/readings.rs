use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use bp_logger_domain::entities::{
    AddedReading, ImportSummary, ReadingInput, RecentReading, RecentReadings, ScatterPoint, TrendPoint, Trends,
    WeeklyRow, WeeklyTable,
};
use bp_logger_domain::Persisted;

/// Accept `"120"`, `120` or `null` for a form field
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        Some(serde_json::Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected text or a number, found {}", other))),
    }
}

/// Request payload for logging a reading.
///
/// Values are taken as typed; range and format checks happen server side so
/// every problem is reported at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateReadingRequest {
    /// Systolic pressure in mmHg (50-260)
    #[serde(default, deserialize_with = "text_or_number")]
    #[schema(value_type = Option<String>, example = "120")]
    pub systolic: Option<String>,

    /// Diastolic pressure in mmHg (30-180)
    #[serde(default, deserialize_with = "text_or_number")]
    #[schema(value_type = Option<String>, example = "80")]
    pub diastolic: Option<String>,

    /// Pulse in bpm (20-220); blank when not taken
    #[serde(default, deserialize_with = "text_or_number")]
    #[schema(value_type = Option<String>, example = "65")]
    pub pulse: Option<String>,

    /// Free text, at most 1000 characters
    #[serde(default)]
    pub notes: Option<String>,

    /// `YYYY-MM-DD HH:MM:SS`; blank means now
    #[serde(default)]
    #[schema(example = "2024-03-01 08:00:00")]
    pub timestamp: Option<String>,
}

impl From<CreateReadingRequest> for ReadingInput {
    fn from(request: CreateReadingRequest) -> Self {
        ReadingInput {
            systolic: request.systolic,
            diastolic: request.diastolic,
            pulse: request.pulse,
            notes: request.notes,
            timestamp: request.timestamp,
        }
    }
}

/// Public representation of a stored reading
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadingResponse {
    /// `YYYY-MM-DD HH:MM`
    pub timestamp: String,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: Option<i32>,
    pub notes: String,
    /// AHA category label
    pub category: String,
    /// Mean arterial pressure, one decimal
    pub map: f64,
    pub pulse_pressure: i32,
}

impl From<RecentReading> for ReadingResponse {
    fn from(reading: RecentReading) -> Self {
        Self {
            timestamp: reading.timestamp,
            systolic: reading.systolic,
            diastolic: reading.diastolic,
            pulse: reading.pulse,
            notes: reading.notes,
            category: reading.category,
            map: reading.map,
            pulse_pressure: reading.pulse_pressure,
        }
    }
}

/// Newest readings first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecentReadingsResponse {
    /// Number of stored readings
    pub total: usize,
    pub readings: Vec<ReadingResponse>,
    /// Backend the data came from (`local` or `gsheets`)
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<RecentReadings>> for RecentReadingsResponse {
    fn from(persisted: Persisted<RecentReadings>) -> Self {
        Self {
            total: persisted.value.total,
            readings: persisted.value.readings.into_iter().map(ReadingResponse::from).collect(),
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

/// Outcome of logging a reading
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddReadingResponse {
    pub reading: ReadingResponse,
    /// Number of stored readings after the append
    pub total: usize,
    /// Backend the reading was saved to
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<AddedReading>> for AddReadingResponse {
    fn from(persisted: Persisted<AddedReading>) -> Self {
        Self {
            reading: persisted.value.reading.into(),
            total: persisted.value.total,
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

/// Outcome of a CSV import
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    /// Rows in the uploaded file
    pub imported: usize,
    /// Stored readings after the merge
    pub total: usize,
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<ImportSummary>> for ImportResponse {
    fn from(persisted: Persisted<ImportSummary>) -> Self {
        Self {
            imported: persisted.value.imported,
            total: persisted.value.total,
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

/// Outcome of clearing all data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearResponse {
    pub message: String,
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<()>> for ClearResponse {
    fn from(persisted: Persisted<()>) -> Self {
        Self {
            message: format!("All data cleared. Saved to {}.", persisted.backend),
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

/// One week of aggregates
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklyRowResponse {
    /// Monday of the week, `YYYY-MM-DD`
    pub week_start: String,
    /// `<metric>_<statistic>` to value; null when the week has no value
    #[schema(value_type = Object)]
    pub values: IndexMap<String, Option<f64>>,
}

impl From<WeeklyRow> for WeeklyRowResponse {
    fn from(row: WeeklyRow) -> Self {
        Self {
            week_start: row.week_start.to_string(),
            values: row.flatten(),
        }
    }
}

/// Weekly count, mean, min and max per metric
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklySummaryResponse {
    /// Column names in display order
    pub columns: Vec<String>,
    /// Oldest week first
    pub rows: Vec<WeeklyRowResponse>,
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<WeeklyTable>> for WeeklySummaryResponse {
    fn from(persisted: Persisted<WeeklyTable>) -> Self {
        Self {
            columns: persisted.value.columns,
            rows: persisted.value.rows.into_iter().map(WeeklyRowResponse::from).collect(),
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendPointResponse {
    /// `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    pub systolic: i32,
    pub diastolic: i32,
    pub systolic_avg: f64,
    pub diastolic_avg: f64,
}

impl From<TrendPoint> for TrendPointResponse {
    fn from(point: TrendPoint) -> Self {
        Self {
            timestamp: point.timestamp.format(bp_logger_data::TIMESTAMP_FORMAT).to_string(),
            systolic: point.systolic,
            diastolic: point.diastolic,
            systolic_avg: point.systolic_avg,
            diastolic_avg: point.diastolic_avg,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScatterPointResponse {
    pub systolic: i32,
    pub diastolic: i32,
}

impl From<ScatterPoint> for ScatterPointResponse {
    fn from(point: ScatterPoint) -> Self {
        Self {
            systolic: point.systolic,
            diastolic: point.diastolic,
        }
    }
}

/// Series behind the trend and scatter charts
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendsResponse {
    /// Rolling window width in days
    pub window_days: i64,
    /// Time order, with trailing averages
    pub series: Vec<TrendPointResponse>,
    pub scatter: Vec<ScatterPointResponse>,
    pub backend: String,
    pub warnings: Vec<String>,
}

impl From<Persisted<Trends>> for TrendsResponse {
    fn from(persisted: Persisted<Trends>) -> Self {
        Self {
            window_days: persisted.value.window_days,
            series: persisted.value.series.into_iter().map(TrendPointResponse::from).collect(),
            scatter: persisted.value.scatter.into_iter().map(ScatterPointResponse::from).collect(),
            backend: persisted.backend.to_string(),
            warnings: persisted.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_numbers_and_text() {
        let request: CreateReadingRequest =
            serde_json::from_str(r#"{"systolic": 120, "diastolic": "80", "pulse": null}"#).unwrap();
        assert_eq!(request.systolic.as_deref(), Some("120"));
        assert_eq!(request.diastolic.as_deref(), Some("80"));
        assert_eq!(request.pulse, None);
        assert_eq!(request.timestamp, None);
    }

    #[test]
    fn test_request_keeps_fractional_numbers_for_validation() {
        let request: CreateReadingRequest = serde_json::from_str(r#"{"systolic": 120.5}"#).unwrap();
        assert_eq!(request.systolic.as_deref(), Some("120.5"));
    }

    #[test]
    fn test_request_rejects_structured_values() {
        assert!(serde_json::from_str::<CreateReadingRequest>(r#"{"systolic": [120]}"#).is_err());
    }
}
