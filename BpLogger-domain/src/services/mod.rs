pub mod aggregation;
pub mod readings;
pub mod validation;

// Domain services
// This module contains business logic implementations.

// Re-export service traits and factory functions
pub use readings::{create_default_reading_service, ReadingService, ReadingServiceError, ReadingServiceTrait};
pub use validation::{parse_int, validate_reading_input, ValidationError, ValidationErrors};

// The metric calculator lives with the stored row model
pub use bp_logger_data::models::{categorize, derive, DerivedMetrics};
