use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Raw reading input as typed by the user; every field is text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReadingInput {
    pub systolic: Option<String>,
    pub diastolic: Option<String>,
    /// Blank means no pulse was taken
    pub pulse: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
    /// Blank means now
    pub timestamp: Option<String>,
}

impl ReadingInput {
    /// Input for a reading taken now with no notes
    pub fn new(systolic: impl Into<String>, diastolic: impl Into<String>) -> Self {
        Self {
            systolic: Some(systolic.into()),
            diastolic: Some(diastolic.into()),
            ..Self::default()
        }
    }

    pub fn with_pulse(mut self, pulse: impl Into<String>) -> Self {
        self.pulse = Some(pulse.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Input that passed validation, ready to become a stored reading
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedReading {
    pub timestamp: NaiveDateTime,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: Option<i32>,
    pub notes: String,
}

/// A reading shaped for the "recent readings" table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentReading {
    /// Minute precision, `YYYY-MM-DD HH:MM`
    pub timestamp: String,
    pub systolic: i32,
    pub diastolic: i32,
    pub pulse: Option<i32>,
    pub notes: String,
    pub category: String,
    pub map: f64,
    pub pulse_pressure: i32,
}

/// Newest readings plus the size of the whole dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentReadings {
    pub total: usize,
    pub readings: Vec<RecentReading>,
}

/// Result of adding one reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedReading {
    pub reading: RecentReading,
    /// Number of readings after the append
    pub total: usize,
}

/// Result of importing a CSV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Rows read from the uploaded file
    pub imported: usize,
    /// Readings stored after the merge
    pub total: usize,
}
