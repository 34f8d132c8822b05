// BpLogger Data
// This crate owns the stored representation of blood pressure readings

// Store configuration (paths, spreadsheet reference, credentials)
pub mod config;

// Row model and the metric calculator
pub mod models;

// Dataset stores and the backend router
pub mod repository;

// Spreadsheet client abstraction and the Google Sheets implementation
pub mod sheets;

pub use config::{ServiceAccountKey, StoreConfig};
pub use models::{BloodPressureCategory, Dataset, Reading, Schema, TIMESTAMP_FORMAT};
pub use repository::{
    BackendRouter, BackendStatus, BackendUsed, DatasetStore, Persisted, ReadingRepositoryTrait, StoreError,
};
