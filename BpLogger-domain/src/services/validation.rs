//! Record validation for user-entered readings.
//!
//! Every field is checked independently so the caller can show all problems
//! at once, next to the field they belong to.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use validator::Validate;

use bp_logger_data::models::parse_timestamp;
use crate::entities::reading::{ReadingInput, ValidatedReading};

pub const SYSTOLIC_RANGE: (i32, i32) = (50, 260);
pub const DIASTOLIC_RANGE: (i32, i32) = (30, 180);
pub const PULSE_RANGE: (i32, i32) = (20, 220);

/// A problem with one input field
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    /// Field the message belongs to
    pub field: String,
    /// Message shown to the user
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Attach the message to another field name
    pub fn for_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }
}

/// All field problems of one input
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl ValidationErrors {
    /// Message for a field, if it failed
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

/// Parse a required whole number within an inclusive range
pub fn parse_int(label: &str, raw: Option<&str>, min: i32, max: i32) -> Result<i32, ValidationError> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(ValidationError::new(label, format!("{} is required", label)));
    }

    let value: i64 = raw
        .parse()
        .map_err(|_| ValidationError::new(label, format!("{} must be a whole number", label)))?;

    if value < i64::from(min) || value > i64::from(max) {
        return Err(ValidationError::new(
            label,
            format!("{} must be between {} and {}", label, min, max),
        ));
    }

    Ok(value as i32)
}

fn is_blank(raw: &Option<String>) -> bool {
    raw.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Current local time without sub-second precision
pub fn now_to_the_second() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Check every field of a reading input, collecting all errors
pub fn validate_reading_input(input: &ReadingInput) -> Result<ValidatedReading, ValidationErrors> {
    let mut errors = Vec::new();

    let systolic = parse_int("Systolic", input.systolic.as_deref(), SYSTOLIC_RANGE.0, SYSTOLIC_RANGE.1)
        .map_err(|e| errors.push(e.for_field("systolic")))
        .ok();
    let diastolic = parse_int("Diastolic", input.diastolic.as_deref(), DIASTOLIC_RANGE.0, DIASTOLIC_RANGE.1)
        .map_err(|e| errors.push(e.for_field("diastolic")))
        .ok();

    let pulse = if is_blank(&input.pulse) {
        None
    } else {
        parse_int("Pulse", input.pulse.as_deref(), PULSE_RANGE.0, PULSE_RANGE.1)
            .map_err(|e| errors.push(e.for_field("pulse")))
            .ok()
    };

    if let Err(validation_errors) = input.validate() {
        for (field, field_errors) in validation_errors.field_errors() {
            for err in field_errors {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field));
                errors.push(ValidationError::new(field.to_string(), message));
            }
        }
    }

    let timestamp = if is_blank(&input.timestamp) {
        Some(now_to_the_second())
    } else {
        let parsed = input.timestamp.as_deref().and_then(parse_timestamp);
        if parsed.is_none() {
            errors.push(ValidationError::new(
                "timestamp",
                "Timestamp must be a date-time (YYYY-MM-DD HH:MM:SS)",
            ));
        }
        parsed
    };

    match (systolic, diastolic, timestamp) {
        (Some(systolic), Some(diastolic), Some(timestamp)) if errors.is_empty() => Ok(ValidatedReading {
            timestamp,
            systolic,
            diastolic,
            pulse,
            notes: input.notes.clone().unwrap_or_default(),
        }),
        _ => Err(ValidationErrors { errors }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_messages() {
        assert_eq!(parse_int("Systolic", Some(""), 50, 260).unwrap_err().message, "Systolic is required");
        assert_eq!(parse_int("Systolic", None, 50, 260).unwrap_err().message, "Systolic is required");
        assert_eq!(
            parse_int("Systolic", Some("abc"), 50, 260).unwrap_err().message,
            "Systolic must be a whole number"
        );
        assert_eq!(
            parse_int("Systolic", Some("120.5"), 50, 260).unwrap_err().message,
            "Systolic must be a whole number"
        );
        assert_eq!(
            parse_int("Systolic", Some("300"), 50, 260).unwrap_err().message,
            "Systolic must be between 50 and 260"
        );
        assert_eq!(parse_int("Systolic", Some(" 120 "), 50, 260), Ok(120));
        assert_eq!(parse_int("Systolic", Some("50"), 50, 260), Ok(50));
        assert_eq!(parse_int("Systolic", Some("260"), 50, 260), Ok(260));
    }

    #[test]
    fn test_valid_input() {
        let input = ReadingInput::new("128", "82")
            .with_pulse("66")
            .with_notes("after coffee")
            .with_timestamp("2024-03-01 07:45:00");

        let reading = validate_reading_input(&input).unwrap();
        assert_eq!(reading.systolic, 128);
        assert_eq!(reading.diastolic, 82);
        assert_eq!(reading.pulse, Some(66));
        assert_eq!(reading.notes, "after coffee");
        assert_eq!(reading.timestamp.to_string(), "2024-03-01 07:45:00");
    }

    #[test]
    fn test_blank_pulse_and_timestamp() {
        let input = ReadingInput::new("118", "76").with_pulse("  ").with_timestamp("");
        let reading = validate_reading_input(&input).unwrap();
        assert_eq!(reading.pulse, None);
        assert_eq!(reading.timestamp.nanosecond(), 0);
        assert_eq!(reading.notes, "");
    }

    #[test]
    fn test_all_errors_are_reported() {
        let input = ReadingInput {
            systolic: Some("".into()),
            diastolic: Some("eighty".into()),
            pulse: Some("500".into()),
            notes: Some("x".repeat(1001)),
            timestamp: Some("yesterday".into()),
        };

        let errors = validate_reading_input(&input).unwrap_err();
        assert_eq!(errors.errors.len(), 5);
        assert_eq!(errors.message_for("systolic"), Some("Systolic is required"));
        assert_eq!(errors.message_for("diastolic"), Some("Diastolic must be a whole number"));
        assert_eq!(errors.message_for("pulse"), Some("Pulse must be between 20 and 220"));
        assert_eq!(errors.message_for("notes"), Some("Notes must be at most 1000 characters"));
        assert_eq!(
            errors.message_for("timestamp"),
            Some("Timestamp must be a date-time (YYYY-MM-DD HH:MM:SS)")
        );
    }

    #[test]
    fn test_notes_limit_counts_characters() {
        let input = ReadingInput::new("120", "80").with_notes("é".repeat(1000));
        assert!(validate_reading_input(&input).is_ok());
    }
}
