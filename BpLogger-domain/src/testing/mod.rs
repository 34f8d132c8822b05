// Testing utilities and mock implementations for the domain layer
// This module is only available when the "mock" feature is enabled

// Re-export the in-memory store and router helpers from the data layer
pub use bp_logger_data::repository::tests::{memory_router, MemoryStore};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bp_logger_data::repository::codec::{dataset_from_csv, dataset_to_csv};
use bp_logger_data::{BackendStatus, BackendUsed, Dataset, Persisted, Reading, Schema};
use crate::entities::conversions;
use crate::entities::reading::{AddedReading, ImportSummary, ReadingInput, RecentReadings};
use crate::entities::summary::{Trends, WeeklyTable};
use crate::health::{ComponentStatus, HealthComponent, HealthServiceTrait, SystemHealth, SystemStatus};
use crate::services::aggregation;
use crate::services::readings::{ReadingServiceError, ReadingServiceTrait, DEFAULT_RECENT_LIMIT};
use crate::services::validation::{validate_reading_input, ValidationError, ValidationErrors};

/// Message used when the mock storage is configured to fail
pub const MOCK_STORAGE_FAILURE: &str = "mock storage is configured to fail";

/// Mock implementation of the ReadingServiceTrait for testing
pub struct MockReadingService {
    readings: Mutex<Dataset>,
    should_fail_validation: bool,
    should_fail_storage: bool,
    fallback_warning: Option<String>,
}

impl Default for MockReadingService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReadingService {
    /// Create a new, empty mock reading service
    pub fn new() -> Self {
        Self {
            readings: Mutex::new(Dataset::new()),
            should_fail_validation: false,
            should_fail_storage: false,
            fallback_warning: None,
        }
    }

    /// Configure the mock to reject every reading input
    pub fn with_validation_failure(mut self) -> Self {
        self.should_fail_validation = true;
        self
    }

    /// Configure the mock to fail every storage call
    pub fn with_storage_failure(mut self) -> Self {
        self.should_fail_storage = true;
        self
    }

    /// Report every call as served by the local fallback with this warning
    pub fn with_fallback_warning(mut self, warning: impl Into<String>) -> Self {
        self.fallback_warning = Some(warning.into());
        self
    }

    /// Add pre-defined readings to the mock
    pub fn with_readings(self, readings: Vec<Reading>) -> Self {
        {
            let mut stored = self.lock();
            for reading in readings {
                stored.push(reading);
            }
            stored.sort_by_timestamp();
        }
        self
    }

    /// Copy of what is currently stored
    pub fn snapshot(&self) -> Dataset {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Dataset> {
        self.readings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn storage_check(&self) -> Result<(), ReadingServiceError> {
        if self.should_fail_storage {
            Err(ReadingServiceError::Storage(MOCK_STORAGE_FAILURE.to_string()))
        } else {
            Ok(())
        }
    }

    fn persisted<T>(&self, value: T) -> Persisted<T> {
        match &self.fallback_warning {
            Some(warning) => Persisted::new(value, BackendUsed::Local).with_warning(warning.clone()),
            None => Persisted::new(value, BackendUsed::Local),
        }
    }
}

#[async_trait]
impl ReadingServiceTrait for MockReadingService {
    async fn add_reading(&self, input: ReadingInput) -> Result<Persisted<AddedReading>, ReadingServiceError> {
        if self.should_fail_validation {
            return Err(ValidationErrors {
                errors: vec![ValidationError::new(
                    "systolic",
                    "Validation failed - mock is configured to fail validation",
                )],
            }
            .into());
        }

        let validated = validate_reading_input(&input)?;
        self.storage_check()?;

        let reading = conversions::convert_to_data_reading(validated);
        let view = conversions::convert_to_domain_recent(&reading);
        let mut stored = self.lock();
        stored.push(reading);

        Ok(self.persisted(AddedReading {
            reading: view,
            total: stored.len(),
        }))
    }

    async fn import_csv(&self, bytes: &[u8]) -> Result<Persisted<ImportSummary>, ReadingServiceError> {
        let incoming = dataset_from_csv(bytes)?;
        self.storage_check()?;

        let mut stored = self.lock();
        let merged = stored.merge(&incoming);
        *stored = merged;

        Ok(self.persisted(ImportSummary {
            imported: incoming.len(),
            total: stored.len(),
        }))
    }

    async fn export_csv(&self) -> Result<Persisted<Vec<u8>>, ReadingServiceError> {
        self.storage_check()?;
        let bytes = dataset_to_csv(Schema::default(), &self.lock())?;
        Ok(self.persisted(bytes))
    }

    async fn clear_all(&self) -> Result<Persisted<()>, ReadingServiceError> {
        self.storage_check()?;
        *self.lock() = Dataset::new();
        Ok(self.persisted(()))
    }

    async fn recent_readings(&self, limit: Option<usize>) -> Result<Persisted<RecentReadings>, ReadingServiceError> {
        self.storage_check()?;
        let stored = self.lock();
        Ok(self.persisted(RecentReadings {
            total: stored.len(),
            readings: stored
                .recent(limit.unwrap_or(DEFAULT_RECENT_LIMIT))
                .into_iter()
                .map(conversions::convert_to_domain_recent)
                .collect(),
        }))
    }

    async fn weekly_summary(&self) -> Result<Persisted<WeeklyTable>, ReadingServiceError> {
        self.storage_check()?;
        Ok(self.persisted(aggregation::weekly_summary(&self.lock())))
    }

    async fn trends(&self) -> Result<Persisted<Trends>, ReadingServiceError> {
        self.storage_check()?;
        Ok(self.persisted(aggregation::trends(&self.lock())))
    }

    fn backend_status(&self) -> BackendStatus {
        BackendStatus {
            backend: BackendUsed::Local,
            csv_path: "mock.csv".to_string(),
            worksheet: None,
            spreadsheet: None,
        }
    }
}

/// Mock implementation of HealthServiceTrait for testing
#[derive(Debug)]
pub struct MockHealthService {
    storage: ComponentStatus,
}

impl Default for MockHealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHealthService {
    /// Create a mock reporting healthy storage
    pub fn new() -> Self {
        Self {
            storage: ComponentStatus::Healthy,
        }
    }

    /// Report storage with the given status
    pub fn with_storage_status(mut self, status: ComponentStatus) -> Self {
        self.storage = status;
        self
    }
}

#[async_trait]
impl HealthServiceTrait for MockHealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let status = match self.storage {
            ComponentStatus::Healthy => SystemStatus::Healthy,
            ComponentStatus::Degraded => SystemStatus::Degraded,
            ComponentStatus::Unhealthy => SystemStatus::Unhealthy,
        };

        let mut components = HashMap::new();
        components.insert(
            "storage".to_string(),
            HealthComponent {
                status: self.storage.clone(),
                details: Some("Mock storage".to_string()),
            },
        );

        SystemHealth {
            status,
            storage: BackendStatus {
                backend: BackendUsed::Local,
                csv_path: "mock.csv".to_string(),
                worksheet: None,
                spreadsheet: None,
            },
            components,
        }
    }

    async fn check_storage_status(&self) -> Result<bool, String> {
        match self.storage {
            ComponentStatus::Healthy => Ok(true),
            ComponentStatus::Degraded => Ok(false),
            ComponentStatus::Unhealthy => Err(MOCK_STORAGE_FAILURE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_stores_valid_readings() {
        let service = MockReadingService::new();
        let added = service.add_reading(ReadingInput::new("120", "80")).await.unwrap();
        assert_eq!(added.value.total, 1);
        assert_eq!(service.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_toggles() {
        let service = MockReadingService::new().with_validation_failure();
        assert!(matches!(
            service.add_reading(ReadingInput::new("120", "80")).await,
            Err(ReadingServiceError::Validation(_))
        ));

        let service = MockReadingService::new().with_storage_failure();
        assert!(matches!(service.trends().await, Err(ReadingServiceError::Storage(_))));
    }

    #[tokio::test]
    async fn test_mock_fallback_warning() {
        let service = MockReadingService::new().with_fallback_warning("Saved locally instead.");
        let cleared = service.clear_all().await.unwrap();
        assert_eq!(cleared.warnings, vec!["Saved locally instead.".to_string()]);
    }
}
