use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use bp_logger_data::repository::codec::{dataset_from_csv, dataset_to_csv};
use bp_logger_data::{BackendRouter, BackendStatus, BackendUsed, Persisted, ReadingRepositoryTrait, StoreConfig, StoreError};
use crate::entities::conversions;
use crate::entities::reading::{AddedReading, ImportSummary, ReadingInput, RecentReadings};
use crate::entities::summary::{Trends, WeeklyTable};
use crate::services::aggregation;
use crate::services::validation::{validate_reading_input, ValidationErrors};

/// Number of readings shown when no limit is given
pub const DEFAULT_RECENT_LIMIT: usize = 25;

/// Reading service errors
#[derive(Debug, Error)]
pub enum ReadingServiceError {
    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// Uploaded file rejected, nothing was stored
    #[error("Import failed: {0}")]
    ImportParse(String),

    /// Local storage failed after any fallback
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ReadingServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ImportParse(message) => ReadingServiceError::ImportParse(message),
            other => ReadingServiceError::Storage(other.to_string()),
        }
    }
}

/// Every user command and view over the stored readings
#[async_trait]
pub trait ReadingServiceTrait: Send + Sync {
    /// Validate input and append it, preferring the spreadsheet
    async fn add_reading(&self, input: ReadingInput) -> Result<Persisted<AddedReading>, ReadingServiceError>;

    /// Merge an uploaded CSV file into the stored readings
    async fn import_csv(&self, bytes: &[u8]) -> Result<Persisted<ImportSummary>, ReadingServiceError>;

    /// Whole dataset as CSV in the local file format
    async fn export_csv(&self) -> Result<Persisted<Vec<u8>>, ReadingServiceError>;

    /// Remove every reading, keeping the header
    async fn clear_all(&self) -> Result<Persisted<()>, ReadingServiceError>;

    /// Newest readings first
    async fn recent_readings(&self, limit: Option<usize>) -> Result<Persisted<RecentReadings>, ReadingServiceError>;

    async fn weekly_summary(&self) -> Result<Persisted<WeeklyTable>, ReadingServiceError>;

    async fn trends(&self) -> Result<Persisted<Trends>, ReadingServiceError>;

    /// Configured storage, for display
    fn backend_status(&self) -> BackendStatus;
}

/// Reading service over a persistence router
pub struct ReadingService<R: ReadingRepositoryTrait> {
    repository: R,
}

impl<R: ReadingRepositoryTrait> ReadingService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

fn log_warnings<T>(persisted: &Persisted<T>) {
    for warning in &persisted.warnings {
        warn!("{}", warning);
    }
}

#[async_trait]
impl<R: ReadingRepositoryTrait> ReadingServiceTrait for ReadingService<R> {
    async fn add_reading(&self, input: ReadingInput) -> Result<Persisted<AddedReading>, ReadingServiceError> {
        let validated = validate_reading_input(&input)?;
        let reading = conversions::convert_to_data_reading(validated);
        let view = conversions::convert_to_domain_recent(&reading);

        let saved = self.repository.append(reading, BackendUsed::Remote).await?;
        log_warnings(&saved);
        info!("Reading saved to {}", saved.backend);

        Ok(saved.map(|dataset| AddedReading {
            reading: view,
            total: dataset.len(),
        }))
    }

    async fn import_csv(&self, bytes: &[u8]) -> Result<Persisted<ImportSummary>, ReadingServiceError> {
        let incoming = dataset_from_csv(bytes)?;
        let imported = incoming.len();

        let merged = self.repository.merge(&incoming).await?;
        log_warnings(&merged);
        info!(
            "Imported {} rows. Total rows: {}. Saved to {}.",
            imported,
            merged.value.len(),
            merged.backend
        );

        Ok(merged.map(|dataset| ImportSummary {
            imported,
            total: dataset.len(),
        }))
    }

    async fn export_csv(&self) -> Result<Persisted<Vec<u8>>, ReadingServiceError> {
        let loaded = self.repository.load_with_fallback().await?;
        let schema = self.repository.schema();
        let bytes = dataset_to_csv(schema, &loaded.value)?;
        Ok(loaded.map(|_| bytes))
    }

    async fn clear_all(&self) -> Result<Persisted<()>, ReadingServiceError> {
        let cleared = self.repository.clear().await?;
        log_warnings(&cleared);
        info!("All data cleared. Saved to {}.", cleared.backend);
        Ok(cleared)
    }

    async fn recent_readings(&self, limit: Option<usize>) -> Result<Persisted<RecentReadings>, ReadingServiceError> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        let loaded = self.repository.load_with_fallback().await?;
        Ok(loaded.map(|dataset| RecentReadings {
            total: dataset.len(),
            readings: dataset
                .recent(limit)
                .into_iter()
                .map(conversions::convert_to_domain_recent)
                .collect(),
        }))
    }

    async fn weekly_summary(&self) -> Result<Persisted<WeeklyTable>, ReadingServiceError> {
        let loaded = self.repository.load_with_fallback().await?;
        Ok(loaded.map(|dataset| aggregation::weekly_summary(&dataset)))
    }

    async fn trends(&self) -> Result<Persisted<Trends>, ReadingServiceError> {
        let loaded = self.repository.load_with_fallback().await?;
        Ok(loaded.map(|dataset| aggregation::trends(&dataset)))
    }

    fn backend_status(&self) -> BackendStatus {
        self.repository.status()
    }
}

/// Create the production reading service from store configuration
pub fn create_default_reading_service(config: &StoreConfig) -> ReadingService<BackendRouter> {
    ReadingService::new(BackendRouter::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_logger_data::repository::tests::{memory_router, MemoryStore};
    use bp_logger_data::{Reading, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use std::sync::Arc;

    fn reading(raw_ts: &str, systolic: i32, diastolic: i32) -> Reading {
        let ts = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).unwrap();
        Reading::new(ts, systolic, diastolic, Some(70), "")
    }

    fn local_service(readings: Vec<Reading>) -> (ReadingService<BackendRouter>, Arc<MemoryStore>) {
        let local = Arc::new(MemoryStore::new(BackendUsed::Local).with_readings(readings));
        (ReadingService::new(memory_router(local.clone(), None)), local)
    }

    #[tokio::test]
    async fn test_add_reading_stores_derived_values() {
        let (service, local) = local_service(vec![]);

        let result = service
            .add_reading(ReadingInput::new("140", "90").with_timestamp("2024-03-01 08:00:00"))
            .await
            .unwrap();

        assert_eq!(result.backend, BackendUsed::Local);
        assert_eq!(result.value.total, 1);
        assert_eq!(result.value.reading.category, "Hypertension Stage 2");

        let stored = local.snapshot();
        assert_eq!(stored.readings()[0].pulse_pressure, 50);
        assert_eq!(stored.readings()[0].map, 106.7);
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_touch_storage() {
        let (service, local) = local_service(vec![reading("2024-03-01 08:00:00", 120, 80)]);

        let err = service.add_reading(ReadingInput::new("", "80")).await.unwrap_err();
        match err {
            ReadingServiceError::Validation(errors) => {
                assert_eq!(errors.message_for("systolic"), Some("Systolic is required"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(local.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_add_reading_falls_back_to_local() {
        let local = Arc::new(MemoryStore::new(BackendUsed::Local));
        let remote = Arc::new(MemoryStore::new(BackendUsed::Remote).with_save_failure());
        let service = ReadingService::new(memory_router(local.clone(), Some(remote)));

        let result = service.add_reading(ReadingInput::new("120", "80")).await.unwrap();
        assert_eq!(result.backend.to_string(), "local");
        assert!(!result.warnings.is_empty());
        assert_eq!(local.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_import_merges_without_duplicates() {
        let (service, local) = local_service(vec![reading("2024-03-01 08:00:00", 120, 80)]);

        let csv = "timestamp,systolic,diastolic,pulse,notes\n\
                   2024-03-01 08:00:00,120,80,70,\n\
                   2024-03-02 08:00:00,135,85,,evening\n";
        let result = service.import_csv(csv.as_bytes()).await.unwrap();

        assert_eq!(result.value, ImportSummary { imported: 2, total: 2 });
        assert_eq!(local.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_import_leaves_data_untouched() {
        let (service, local) = local_service(vec![reading("2024-03-01 08:00:00", 120, 80)]);

        let csv = "timestamp,systolic,diastolic\n2024-03-02 08:00:00,high,85\n";
        let err = service.import_csv(csv.as_bytes()).await.unwrap_err();
        assert!(matches!(err, ReadingServiceError::ImportParse(_)));
        assert_eq!(local.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_export_then_import_is_stable() {
        let (service, _) = local_service(vec![
            reading("2024-03-01 08:00:00", 120, 80),
            reading("2024-03-02 08:00:00", 135, 85),
        ]);

        let exported = service.export_csv().await.unwrap().value;
        let result = service.import_csv(&exported).await.unwrap();
        assert_eq!(result.value.total, 2);
        assert_eq!(service.export_csv().await.unwrap().value, exported);
    }

    #[tokio::test]
    async fn test_recent_readings_newest_first() {
        let readings = (1..=30)
            .map(|day| reading(&format!("2024-03-{:02} 08:00:00", day), 120, 80))
            .collect();
        let (service, _) = local_service(readings);

        let recent = service.recent_readings(None).await.unwrap().value;
        assert_eq!(recent.total, 30);
        assert_eq!(recent.readings.len(), DEFAULT_RECENT_LIMIT);
        assert_eq!(recent.readings[0].timestamp, "2024-03-30 08:00");

        let three = service.recent_readings(Some(3)).await.unwrap().value;
        assert_eq!(three.readings.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (service, local) = local_service(vec![reading("2024-03-01 08:00:00", 120, 80)]);
        let result = service.clear_all().await.unwrap();
        assert_eq!(result.backend, BackendUsed::Local);
        assert!(local.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_views_over_loaded_data() {
        let (service, _) = local_service(vec![
            reading("2024-03-05 08:00:00", 120, 80),
            reading("2024-03-06 08:00:00", 130, 80),
        ]);

        let weekly = service.weekly_summary().await.unwrap().value;
        assert_eq!(weekly.rows[0].value("systolic_mean"), Some(125.0));

        let trends = service.trends().await.unwrap().value;
        assert_eq!(trends.series.len(), 2);
        assert_eq!(trends.series[1].systolic_avg, 125.0);
        assert_eq!(trends.scatter.len(), 2);
    }

    #[tokio::test]
    async fn test_local_failure_is_reported() {
        let local = Arc::new(MemoryStore::new(BackendUsed::Local).with_load_failure());
        let service = ReadingService::new(memory_router(local, None));
        assert!(matches!(
            service.recent_readings(None).await,
            Err(ReadingServiceError::Storage(_))
        ));
    }
}
