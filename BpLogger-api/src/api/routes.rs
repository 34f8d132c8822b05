use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Extension, Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use bp_logger_domain::health::create_health_service;
use crate::api::handlers::{health, readings};
use crate::api::handlers::readings::ReadingService;
use crate::openapi::configure_swagger_routes;

/// Create the application router over a reading service
pub fn create_app(service: ReadingService) -> Router {
    debug!("Creating application router");

    let health_service = create_health_service(service.clone());

    let api_routes = Router::new()
        // Specific routes before the collection route
        .route("/readings/weekly", get(readings::weekly_summary))
        .route("/readings/trends", get(readings::trends))
        .route("/readings/export", get(readings::export_readings))
        .route("/readings/import", post(readings::import_readings))
        .route(
            "/readings",
            get(readings::list_readings)
                .post(readings::create_reading)
                .delete(readings::clear_readings),
        );

    debug!("API routes configured");

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .layer(Extension(health_service));

    let app = Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .with_state(service);

    let app = add_swagger_ui(app);
    debug!("Swagger UI merged");

    let app = configure_layers(app);

    health::initialize_server_start_time();
    debug!("Health check service initialized");

    app
}

/// Add Swagger UI to the router
pub fn add_swagger_ui(app: Router) -> Router {
    app.merge(configure_swagger_routes())
}

/// CORS, response headers and request tracing
pub fn configure_layers(app: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    let headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    app.layer(cors).layer(headers).layer(TraceLayer::new_for_http())
}
