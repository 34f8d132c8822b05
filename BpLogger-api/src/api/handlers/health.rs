use axum::{http::StatusCode, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use std::collections::BTreeMap;
use std::sync::{Arc, Once};
use std::time::{SystemTime, UNIX_EPOCH};
use once_cell::sync::OnceCell;

use bp_logger_domain::health::{ComponentStatus as DomainComponentStatus, HealthServiceTrait, SystemStatus};
use crate::entities::common::StorageInfo;

/// Health check response model
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Current service status ("ok", "degraded", or "error")
    pub status: String,
    /// Current application version from Cargo manifest
    pub version: String,
    /// Timestamp of when the response was generated
    pub timestamp: u64,
    /// Uptime of the service in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    /// Configured storage backend
    pub storage: StorageInfo,
    /// Status per component
    pub components: BTreeMap<String, ComponentHealthStatus>,
    /// Environment information
    pub environment: String,
}

/// Health status for an individual component
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ComponentHealthStatus {
    /// Status of the component ("ok", "degraded", or "error")
    pub status: String,
    /// Optional message with more details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Track the time when the server started using a thread-safe OnceCell
static SERVER_START_TIME: OnceCell<u64> = OnceCell::new();
static INIT: Once = Once::new();

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// Initialize the server start time
pub fn initialize_server_start_time() {
    INIT.call_once(|| {
        let _ = SERVER_START_TIME.set(now_secs());
    });
}

/// Health check endpoint reporting storage reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API is serving; storage may be on the local fallback", body = HealthResponse),
        (status = 503, description = "No storage backend is readable", body = HealthResponse)
    ),
    tag = "health"
)]
#[instrument(skip(health_service))]
pub async fn health_check(
    Extension(health_service): Extension<Arc<dyn HealthServiceTrait>>,
) -> impl IntoResponse {
    info!("Health check requested");

    let now = now_secs();
    let uptime = SERVER_START_TIME.get().map(|&start_time| now.saturating_sub(start_time));

    let system_health = health_service.get_system_health().await;

    let (overall_status, code) = match system_health.status {
        SystemStatus::Healthy => ("ok", StatusCode::OK),
        SystemStatus::Degraded => ("degraded", StatusCode::OK),
        SystemStatus::Unhealthy => ("error", StatusCode::SERVICE_UNAVAILABLE),
    };

    let components = system_health
        .components
        .into_iter()
        .map(|(name, component)| {
            (
                name,
                ComponentHealthStatus {
                    status: map_component_status(&component.status),
                    message: component.details,
                },
            )
        })
        .collect();

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: now,
        uptime,
        storage: system_health.storage.into(),
        components,
        environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
    };

    (code, Json(response))
}

/// Map domain component status to API status string
fn map_component_status(status: &DomainComponentStatus) -> String {
    match status {
        DomainComponentStatus::Healthy => "ok",
        DomainComponentStatus::Degraded => "degraded",
        DomainComponentStatus::Unhealthy => "error",
    }
    .to_string()
}
