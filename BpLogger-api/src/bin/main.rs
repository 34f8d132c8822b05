use std::net::SocketAddr;
use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use bp_logger_api::api::create_application;
use bp_logger_api::api::handlers::health::initialize_server_start_time;
use bp_logger_domain::StoreConfig;

/// Entry point for the blood pressure logger API server
///
/// Loads `.env`, sets up tracing, builds the store configuration from the
/// environment and serves the router until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenv().is_ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(false)
            .with_ansi(true)
            .with_timer(fmt::time::uptime())
            .with_writer(std::io::stdout))
        .with(env_filter)
        .init();

    if !env_loaded {
        warn!(".env file not found or couldn't be read. Using environment variables.");
    }

    info!("Starting BP Logger API server");

    let config = StoreConfig::from_env().context("Invalid store configuration")?;
    if config.service_account.is_none() {
        info!("No Google service account configured, storing readings in {}", config.csv_path.display());
    }

    initialize_server_start_time();

    let app = create_application(&config);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a number")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");
}
