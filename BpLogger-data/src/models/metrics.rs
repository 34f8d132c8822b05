use serde::{Deserialize, Serialize};
use std::fmt;

/// Blood pressure category based on measurements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BloodPressureCategory {
    /// Normal blood pressure (systolic < 120 and diastolic < 80)
    #[serde(rename = "Normal")]
    Normal,

    /// Elevated blood pressure (systolic 120-129 and diastolic < 80)
    #[serde(rename = "Elevated")]
    Elevated,

    /// Stage 1 Hypertension (systolic 130-139 or diastolic 80-89)
    #[serde(rename = "Hypertension Stage 1")]
    HypertensionStage1,

    /// Stage 2 Hypertension (systolic >= 140 or diastolic >= 90)
    #[serde(rename = "Hypertension Stage 2")]
    HypertensionStage2,

    /// No rule of the ladder matched
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl BloodPressureCategory {
    /// All categories in ladder order
    pub const ALL: [BloodPressureCategory; 5] = [
        BloodPressureCategory::Normal,
        BloodPressureCategory::Elevated,
        BloodPressureCategory::HypertensionStage1,
        BloodPressureCategory::HypertensionStage2,
        BloodPressureCategory::Uncategorized,
    ];

    /// Label written to the `category` column
    pub fn label(&self) -> &'static str {
        match self {
            BloodPressureCategory::Normal => "Normal",
            BloodPressureCategory::Elevated => "Elevated",
            BloodPressureCategory::HypertensionStage1 => "Hypertension Stage 1",
            BloodPressureCategory::HypertensionStage2 => "Hypertension Stage 2",
            BloodPressureCategory::Uncategorized => "Uncategorized",
        }
    }

    /// Parse a stored label back into a category
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for BloodPressureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values derived from a systolic/diastolic pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    /// Systolic minus diastolic, never clamped
    pub pulse_pressure: i32,

    /// Mean arterial pressure rounded to one decimal place
    pub map: f64,
}

/// Categorize blood pressure based on measurements.
///
/// Rules are checked top to bottom and the first match wins.
pub fn categorize(systolic: i32, diastolic: i32) -> BloodPressureCategory {
    if systolic < 120 && diastolic < 80 {
        return BloodPressureCategory::Normal;
    }
    if (120..130).contains(&systolic) && diastolic < 80 {
        return BloodPressureCategory::Elevated;
    }
    if (130..140).contains(&systolic) || (80..90).contains(&diastolic) {
        return BloodPressureCategory::HypertensionStage1;
    }
    if systolic >= 140 || diastolic >= 90 {
        return BloodPressureCategory::HypertensionStage2;
    }
    BloodPressureCategory::Uncategorized
}

/// Compute pulse pressure and mean arterial pressure
pub fn derive(systolic: i32, diastolic: i32) -> DerivedMetrics {
    let pulse_pressure = systolic - diastolic;
    let map = round_one_decimal(f64::from(diastolic) + f64::from(pulse_pressure) / 3.0);

    DerivedMetrics { pulse_pressure, map }
}

/// Round to one decimal place.
///
/// `diastolic + pp / 3` never lands exactly on a half step, so half-away-from-zero
/// and half-to-even agree for every input.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(categorize(119, 79), BloodPressureCategory::Normal);
        assert_eq!(categorize(120, 79), BloodPressureCategory::Elevated);
        assert_eq!(categorize(129, 79), BloodPressureCategory::Elevated);
        assert_eq!(categorize(130, 79), BloodPressureCategory::HypertensionStage1);
        assert_eq!(categorize(139, 89), BloodPressureCategory::HypertensionStage1);
        assert_eq!(categorize(140, 70), BloodPressureCategory::HypertensionStage2);
    }

    #[test]
    fn test_low_systolic_with_stage1_diastolic() {
        // The diastolic clause of stage 1 is reached before anything else
        assert_eq!(categorize(110, 85), BloodPressureCategory::HypertensionStage1);
        assert_eq!(categorize(110, 95), BloodPressureCategory::HypertensionStage2);
    }

    #[test]
    fn test_categorize_is_total_and_deterministic() {
        for systolic in 0..=300 {
            for diastolic in 0..=200 {
                let first = categorize(systolic, diastolic);
                assert_eq!(first, categorize(systolic, diastolic));
                assert!(BloodPressureCategory::ALL.contains(&first));
            }
        }
    }

    #[test]
    fn test_derive() {
        let metrics = derive(120, 80);
        assert_eq!(metrics.pulse_pressure, 40);
        assert_eq!(metrics.map, 93.3);

        let metrics = derive(140, 90);
        assert_eq!(metrics.pulse_pressure, 50);
        assert_eq!(metrics.map, 106.7);
    }

    #[test]
    fn test_derive_negative_pulse_pressure() {
        let metrics = derive(70, 80);
        assert_eq!(metrics.pulse_pressure, -10);
        assert_eq!(metrics.map, 76.7);
    }

    #[test]
    fn test_label_round_trip() {
        for category in BloodPressureCategory::ALL {
            assert_eq!(BloodPressureCategory::from_label(category.label()), Some(category));
        }
        assert_eq!(BloodPressureCategory::from_label("Hypertensive Crisis"), None);
    }
}
