// Public entities for the blood pressure logger API
// This module contains data structures that are shared across the application boundary

// Reading requests and responses
pub mod readings;

// Common entities for error handling
pub mod common;
