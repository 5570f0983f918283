//! Startup helpers for the docs chat server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::server::{self, AppState};

/// Run the server until it stops.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting docs chat v{}", env!("CARGO_PKG_VERSION"));

    let (state, port) = match initialize() {
        Ok(ready) => ready,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server(state, port, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Read the environment and build application state without starting the server.
///
/// # Errors
/// Returns an error if the configuration is invalid or no API key is set.
pub fn initialize() -> Result<(Arc<AppState>, u16), Box<dyn std::error::Error + Send + Sync>> {
    let config = ChatConfig::from_env().map_err(|e| format!("Invalid configuration: {e}"))?;
    tracing::info!(
        model = %config.model,
        domain = %config.domain,
        "Generation endpoint: {}",
        config.base_url
    );

    let port = config.port;
    let state = AppState::new(config).map_err(|e| format!("Failed to create state: {e}"))?;
    Ok((state, port))
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
