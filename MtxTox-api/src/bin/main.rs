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

use mtx_tox_api::{create_application, AppState, ServerConfig};
use mtx_tox_domain::DiagnosisServiceTrait;

/// Entry point of the MtxTox API server
///
/// Loads `.env`, sets up tracing, loads the dataset and rule parameters,
/// runs the first evaluation pass and serves until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    if dotenv().is_err() {
        eprintln!("Warning: .env file not found or couldn't be read. Using environment variables.");
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stdout),
        )
        .with(env_filter)
        .init();

    info!("Starting MtxTox API server");

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let engine = config.build_engine().context("failed to build diagnosis engine")?;

    let positive = engine.flags().iter().filter(|flag| flag.positive).count();
    if engine.repository().is_empty() {
        warn!("Serving an empty dataset");
    }
    info!(
        "Evaluated {} diagnoses for {} patients, {} positive flags",
        engine.catalog().len(),
        engine.flags().patient_count(),
        positive
    );

    let app = create_application(AppState::new(engine, config.environment.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
