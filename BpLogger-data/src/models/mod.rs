// Storage models and the metric calculator
pub mod metrics;
pub mod reading;

// Re-export commonly used types
pub use metrics::{categorize, derive, BloodPressureCategory, DerivedMetrics};
pub use reading::{parse_timestamp, Dataset, Reading, Schema, TIMESTAMP_FORMAT};
