//! HTTP server for the documentation chat.
//!
//! Provides endpoints for:
//! - Sending a message and starting a turn
//! - Reading the conversation, or following it over server-sent events
//! - Serving the chat page

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Serve the chat until `shutdown_signal` completes, then drain open connections.
///
/// Port `0` binds an ephemeral port.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run_server<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app: Router = create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    tracing::info!("Docs chat listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;
    tracing::info!("Docs chat stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Content;
    use crate::config::ChatConfig;
    use crate::llm::{GenerationAdapter, GenerationResult, PartialResult, PartialResultStream};

    struct SilentAdapter;

    #[async_trait::async_trait]
    impl GenerationAdapter for SilentAdapter {
        async fn stream_response(
            &self,
            _history: &[Content],
            _new_message: &str,
        ) -> GenerationResult<PartialResultStream> {
            Ok(Box::pin(futures::stream::empty::<GenerationResult<PartialResult>>()))
        }
    }

    #[tokio::test]
    async fn test_server_returns_once_shutdown_resolves() {
        let state = AppState::with_adapter(ChatConfig::new(), Arc::new(SilentAdapter));
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(run_server(state, 0, async move {
            let _ = stopped.await;
        }));
        let _ = stop.send(());

        let finished = tokio::time::timeout(std::time::Duration::from_secs(5), server).await;
        assert!(matches!(finished, Ok(Ok(Ok(())))));
    }
}
