use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // Reading endpoints
        crate::api::handlers::readings::list_readings,
        crate::api::handlers::readings::create_reading,
        crate::api::handlers::readings::clear_readings,
        crate::api::handlers::readings::weekly_summary,
        crate::api::handlers::readings::trends,
        crate::api::handlers::readings::export_readings,
        crate::api::handlers::readings::import_readings
    ),
    components(
        schemas(
            // Entities
            crate::entities::readings::CreateReadingRequest,
            crate::entities::readings::ReadingResponse,
            crate::entities::readings::RecentReadingsResponse,
            crate::entities::readings::AddReadingResponse,
            crate::entities::readings::ImportResponse,
            crate::entities::readings::ClearResponse,
            crate::entities::readings::WeeklyRowResponse,
            crate::entities::readings::WeeklySummaryResponse,
            crate::entities::readings::TrendPointResponse,
            crate::entities::readings::ScatterPointResponse,
            crate::entities::readings::TrendsResponse,
            crate::entities::common::StorageInfo,

            // Health handlers
            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentHealthStatus,

            // Reading handlers
            crate::api::handlers::readings::ErrorResponse,
            crate::api::handlers::readings::RecentQueryParams
        )
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "readings", description = "Blood pressure readings, summaries and CSV transfer")
    ),
    info(
        title = "BP Logger API",
        version = "0.1.0",
        description = "Personal blood pressure log stored in a CSV file or a Google Sheets worksheet",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
