// Domain entities and value objects
pub mod conversions;
pub mod reading;
pub mod summary;

// Re-export common types for easier imports
pub use reading::{AddedReading, ImportSummary, ReadingInput, RecentReading, RecentReadings, ValidatedReading};
pub use summary::{ColumnStats, ScatterPoint, TrendPoint, Trends, WeeklyRow, WeeklyTable};
