//! Domain layer health check functionality
//! This module provides health check services for the application

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use bp_logger_data::{BackendStatus, BackendUsed};
use crate::services::ReadingServiceTrait;

/// System health status
#[derive(Debug, Clone, PartialEq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component works through a fallback
    Degraded,
    /// Component is not functioning
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    /// Status of the component
    pub status: ComponentStatus,
    /// Optional details about the component status
    pub details: Option<String>,
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    /// Overall system status
    pub status: SystemStatus,
    /// Configured storage
    pub storage: BackendStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check that stored readings can be read.
    /// Ok(true) when the configured backend answered, Ok(false) when only the
    /// local fallback did, Err when nothing could be read.
    async fn check_storage_status(&self) -> Result<bool, String>;
}

/// Health service that checks storage through the reading service
pub struct HealthService {
    readings: Arc<dyn ReadingServiceTrait>,
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("storage", &self.readings.backend_status())
            .finish()
    }
}

impl HealthService {
    pub fn new(readings: Arc<dyn ReadingServiceTrait>) -> Self {
        Self { readings }
    }
}

fn describe(status: &BackendStatus) -> String {
    match status.backend {
        BackendUsed::Remote => format!(
            "gsheets: worksheet {}",
            status.worksheet.as_deref().unwrap_or_default()
        ),
        BackendUsed::Local => format!("local: {}", status.csv_path),
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let storage = self.readings.backend_status();

        let storage_component = match self.check_storage_status().await {
            Ok(true) => HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some(describe(&storage)),
            },
            Ok(false) => HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some("Google Sheets unavailable, serving local CSV".to_string()),
            },
            Err(e) => HealthComponent {
                status: ComponentStatus::Unhealthy,
                details: Some(e),
            },
        };

        let status = match storage_component.status {
            ComponentStatus::Healthy => SystemStatus::Healthy,
            ComponentStatus::Degraded => SystemStatus::Degraded,
            ComponentStatus::Unhealthy => SystemStatus::Unhealthy,
        };

        SystemHealth {
            status,
            storage,
            components: vec![("storage".to_string(), storage_component)].into_iter().collect(),
        }
    }

    async fn check_storage_status(&self) -> Result<bool, String> {
        match self.readings.recent_readings(Some(0)).await {
            Ok(loaded) => Ok(loaded.warnings.is_empty()),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Factory function to create a health service
pub fn create_health_service(readings: Arc<dyn ReadingServiceTrait>) -> Arc<dyn HealthServiceTrait> {
    Arc::new(HealthService::new(readings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ReadingService;
    use bp_logger_data::repository::tests::{memory_router, MemoryStore};

    fn service(local: MemoryStore, remote: Option<MemoryStore>) -> Arc<dyn ReadingServiceTrait> {
        Arc::new(ReadingService::new(memory_router(Arc::new(local), remote.map(Arc::new))))
    }

    #[tokio::test]
    async fn test_healthy_local_storage() {
        let health = HealthService::new(service(MemoryStore::new(BackendUsed::Local), None))
            .get_system_health()
            .await;
        assert_eq!(health.status, SystemStatus::Healthy);
        assert!(health.components.contains_key("storage"));
        assert_eq!(health.storage.backend, BackendUsed::Local);
    }

    #[tokio::test]
    async fn test_remote_outage_is_degraded() {
        let health = HealthService::new(service(
            MemoryStore::new(BackendUsed::Local),
            Some(MemoryStore::new(BackendUsed::Remote).with_load_failure()),
        ))
        .get_system_health()
        .await;
        assert_eq!(health.status, SystemStatus::Degraded);
    }

    #[tokio::test]
    async fn test_local_outage_is_unhealthy() {
        let health = HealthService::new(service(MemoryStore::new(BackendUsed::Local).with_load_failure(), None))
            .get_system_health()
            .await;
        assert_eq!(health.status, SystemStatus::Unhealthy);
        assert_eq!(health.components["storage"].status, ComponentStatus::Unhealthy);
    }
}
