use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use bp_logger_domain::services::{create_default_reading_service, ReadingServiceError, ReadingServiceTrait};
use bp_logger_domain::StoreConfig;

use crate::entities::readings::{
    AddReadingResponse, ClearResponse, CreateReadingRequest, ImportResponse, RecentReadingsResponse, TrendsResponse,
    WeeklySummaryResponse,
};

/// File name offered for CSV downloads
pub const EXPORT_FILE_NAME: &str = "bp_data.csv";

/// Response header naming the backend that served a download
pub const STORAGE_BACKEND_HEADER: &str = "x-storage-backend";

/// Response header carrying storage warnings for a download, joined with "; "
pub const STORAGE_WARNINGS_HEADER: &str = "x-storage-warnings";

/// Query parameters for the recent readings table
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RecentQueryParams {
    /// Maximum number of readings (default: 25)
    pub limit: Option<usize>,
}

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a validation error response
    pub fn validation_error(message: &str, details: Option<serde_json::Value>) -> Self {
        Self {
            error: "validation_error".to_string(),
            message: message.to_string(),
            details,
        }
    }

    /// Create an import error response
    pub fn import_error(message: &str) -> Self {
        Self {
            error: "import_error".to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    /// Create a storage error response
    pub fn storage_error(message: &str) -> Self {
        Self {
            error: "storage_error".to_string(),
            message: message.to_string(),
            details: None,
        }
    }
}

impl From<ReadingServiceError> for ErrorResponse {
    fn from(err: ReadingServiceError) -> Self {
        match err {
            ReadingServiceError::Validation(errors) => {
                let fields: serde_json::Map<String, serde_json::Value> = errors
                    .errors
                    .iter()
                    .map(|e| (e.field.clone(), serde_json::Value::String(e.message.clone())))
                    .collect();
                ErrorResponse::validation_error(&errors.to_string(), Some(serde_json::Value::Object(fields)))
            }
            ReadingServiceError::ImportParse(message) => ErrorResponse::import_error(&message),
            ReadingServiceError::Storage(message) => ErrorResponse::storage_error(&message),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "validation_error" | "import_error" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Header value for a list of warnings; control characters become spaces
fn warnings_header_value(warnings: &[String]) -> Option<HeaderValue> {
    if warnings.is_empty() {
        return None;
    }
    let joined: String = warnings
        .join("; ")
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    HeaderValue::from_str(&joined).ok()
}

fn log_failure(operation: &str, err: &ReadingServiceError) {
    match err {
        ReadingServiceError::Storage(message) => error!("{} failed: {}", operation, message),
        other => info!("{} rejected: {}", operation, other),
    }
}

/// Service type for dependency injection
pub type ReadingService = Arc<dyn ReadingServiceTrait>;

/// Create the production service for the handlers to use
pub fn create_service(config: &StoreConfig) -> ReadingService {
    Arc::new(create_default_reading_service(config))
}

/// Most recent readings, newest first
#[utoipa::path(
    get,
    path = "/api/v1/readings",
    params(RecentQueryParams),
    responses(
        (status = 200, description = "Recent readings", body = RecentReadingsResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service))]
pub async fn list_readings(
    State(service): State<ReadingService>,
    Query(params): Query<RecentQueryParams>,
) -> Result<Json<RecentReadingsResponse>, ErrorResponse> {
    match service.recent_readings(params.limit).await {
        Ok(recent) => Ok(Json(recent.into())),
        Err(e) => {
            log_failure("Loading readings", &e);
            Err(e.into())
        }
    }
}

/// Log a new reading
#[utoipa::path(
    post,
    path = "/api/v1/readings",
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading saved", body = AddReadingResponse),
        (status = 400, description = "Invalid reading, messages per field", body = ErrorResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service, request))]
pub async fn create_reading(
    State(service): State<ReadingService>,
    Json(request): Json<CreateReadingRequest>,
) -> Result<(StatusCode, Json<AddReadingResponse>), ErrorResponse> {
    match service.add_reading(request.into()).await {
        Ok(added) => {
            info!("Reading saved to {}", added.backend);
            Ok((StatusCode::CREATED, Json(added.into())))
        }
        Err(e) => {
            log_failure("Saving reading", &e);
            Err(e.into())
        }
    }
}

/// Remove every reading, keeping the header row
#[utoipa::path(
    delete,
    path = "/api/v1/readings",
    responses(
        (status = 200, description = "All data cleared", body = ClearResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service))]
pub async fn clear_readings(State(service): State<ReadingService>) -> Result<Json<ClearResponse>, ErrorResponse> {
    match service.clear_all().await {
        Ok(cleared) => Ok(Json(cleared.into())),
        Err(e) => {
            log_failure("Clearing readings", &e);
            Err(e.into())
        }
    }
}

/// Weekly aggregates of every numeric column
#[utoipa::path(
    get,
    path = "/api/v1/readings/weekly",
    responses(
        (status = 200, description = "Weekly summary, oldest week first", body = WeeklySummaryResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service))]
pub async fn weekly_summary(
    State(service): State<ReadingService>,
) -> Result<Json<WeeklySummaryResponse>, ErrorResponse> {
    match service.weekly_summary().await {
        Ok(table) => Ok(Json(table.into())),
        Err(e) => {
            log_failure("Weekly summary", &e);
            Err(e.into())
        }
    }
}

/// Rolling 7-day averages and systolic/diastolic pairs
#[utoipa::path(
    get,
    path = "/api/v1/readings/trends",
    responses(
        (status = 200, description = "Chart series", body = TrendsResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service))]
pub async fn trends(State(service): State<ReadingService>) -> Result<Json<TrendsResponse>, ErrorResponse> {
    match service.trends().await {
        Ok(trends) => Ok(Json(trends.into())),
        Err(e) => {
            log_failure("Trends", &e);
            Err(e.into())
        }
    }
}

/// Download every reading as CSV
#[utoipa::path(
    get,
    path = "/api/v1/readings/export",
    responses(
        (status = 200, description = "CSV file in the local storage format", content_type = "text/csv", body = String,
            headers(
                ("x-storage-backend" = String, description = "Backend the data was read from: local or gsheets"),
                ("x-storage-warnings" = String, description = "Storage fallback warnings joined with \"; \", present only when any occurred")
            )),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service))]
pub async fn export_readings(State(service): State<ReadingService>) -> Result<Response, ErrorResponse> {
    match service.export_csv().await {
        Ok(exported) => {
            for warning in &exported.warnings {
                warn!("{}", warning);
            }
            let headers = [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                ),
                (HeaderName::from_static(STORAGE_BACKEND_HEADER), exported.backend.to_string()),
            ];
            let mut response = (StatusCode::OK, headers, exported.value).into_response();
            if let Some(value) = warnings_header_value(&exported.warnings) {
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(STORAGE_WARNINGS_HEADER), value);
            }
            Ok(response)
        }
        Err(e) => {
            log_failure("Export", &e);
            Err(e.into())
        }
    }
}

/// Merge an uploaded CSV file into the stored readings
#[utoipa::path(
    post,
    path = "/api/v1/readings/import",
    request_body(content = String, content_type = "text/csv", description = "CSV with at least timestamp, systolic and diastolic columns"),
    responses(
        (status = 200, description = "Rows merged", body = ImportResponse),
        (status = 400, description = "File could not be parsed; nothing was stored", body = ErrorResponse),
        (status = 500, description = "Storage unavailable", body = ErrorResponse),
    ),
    tag = "readings"
)]
#[instrument(skip(service, body), fields(bytes = body.len()))]
pub async fn import_readings(
    State(service): State<ReadingService>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ErrorResponse> {
    match service.import_csv(&body).await {
        Ok(summary) => Ok(Json(summary.into())),
        Err(e) => {
            log_failure("Import", &e);
            Err(e.into())
        }
    }
}
