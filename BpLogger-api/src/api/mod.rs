pub mod handlers;
pub mod routes;

use axum::Router;
use bp_logger_domain::StoreConfig;

/// Create the application router backed by the configured storage
pub fn create_application(config: &StoreConfig) -> Router {
    routes::create_app(handlers::readings::create_service(config))
}
