use bp_logger_data::Reading;

use crate::entities::reading::{RecentReading, ValidatedReading};

/// Conversion functions between domain entities and data models.
/// These follow the pattern convert_to_[target_layer]_[model_name].

/// Display layout for timestamps in the recent readings table
pub const RECENT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Build the stored row for validated input, derived columns included
pub fn convert_to_data_reading(input: ValidatedReading) -> Reading {
    Reading::new(input.timestamp, input.systolic, input.diastolic, input.pulse, input.notes)
}

/// Shape a stored row for display
pub fn convert_to_domain_recent(reading: &Reading) -> RecentReading {
    RecentReading {
        timestamp: reading.timestamp.format(RECENT_TIMESTAMP_FORMAT).to_string(),
        systolic: reading.systolic,
        diastolic: reading.diastolic,
        pulse: reading.pulse,
        notes: reading.notes.clone(),
        category: reading.category.label().to_string(),
        map: reading.map,
        pulse_pressure: reading.pulse_pressure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_logger_data::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;

    #[test]
    fn test_recent_view_uses_minute_precision() {
        let ts = NaiveDateTime::parse_from_str("2024-03-01 08:30:45", TIMESTAMP_FORMAT).unwrap();
        let reading = convert_to_data_reading(ValidatedReading {
            timestamp: ts,
            systolic: 140,
            diastolic: 90,
            pulse: None,
            notes: "left arm".into(),
        });

        let view = convert_to_domain_recent(&reading);
        assert_eq!(view.timestamp, "2024-03-01 08:30");
        assert_eq!(view.category, "Hypertension Stage 2");
        assert_eq!(view.map, 106.7);
        assert_eq!(view.pulse_pressure, 50);
        assert_eq!(reading.timestamp, ts);
    }
}
