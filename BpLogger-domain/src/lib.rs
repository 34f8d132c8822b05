// BpLogger Domain
// This crate contains the business logic for the blood pressure logger

// Services that implement business logic
pub mod services;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Testing utilities - only available with mock feature
#[cfg(any(test, feature = "mock"))]
pub mod testing;

// Re-export the storage types callers need alongside the services
pub use bp_logger_data::{
    BackendRouter, BackendStatus, BackendUsed, BloodPressureCategory, Dataset, Persisted, Reading,
    ReadingRepositoryTrait, StoreConfig,
};
