//! HTTP route handlers for the chat API.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::chat::{ConversationSnapshot, MessageId, RejectReason};

use super::state::AppState;

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/info", get(chat_info))
        .route("/api/conversation", get(conversation))
        .route("/api/chat", post(send_message))
        .route("/api/events", get(conversation_events))
        .fallback_service(static_files)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "docs-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Static details the page header and welcome screen need.
#[derive(Debug, Serialize)]
pub struct ChatInfo {
    /// Documentation domain answers are restricted to.
    pub domain: String,
    /// Model answering the questions.
    pub model: String,
    /// Line shown on the empty conversation screen.
    pub welcome: String,
}

async fn chat_info(State(state): State<Arc<AppState>>) -> Json<ChatInfo> {
    let domain = state.config.domain.clone();
    Json(ChatInfo {
        welcome: format!("Ask me anything about {domain}'s documentation."),
        model: state.config.model.clone(),
        domain,
    })
}

/// Current transcript, lifecycle and error indicator.
async fn conversation(State(state): State<Arc<AppState>>) -> Json<ConversationSnapshot> {
    Json(state.controller.snapshot())
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message, as typed.
    pub message: String,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Whether a turn was started.
    pub accepted: bool,
    /// Model message the answer streams into, when accepted.
    pub message_id: Option<MessageId>,
    /// Why the send was ignored, when not accepted.
    pub reason: Option<RejectReason>,
}

/// Start a turn in the background. Rejections are not errors.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    match state.controller.spawn_turn(request.message) {
        Ok(message_id) => (
            StatusCode::ACCEPTED,
            Json(ChatResponse {
                accepted: true,
                message_id: Some(message_id),
                reason: None,
            }),
        ),
        Err(reason) => (
            StatusCode::OK,
            Json(ChatResponse {
                accepted: false,
                message_id: None,
                reason: Some(reason),
            }),
        ),
    }
}

/// Push a snapshot on connect and after every change.
async fn conversation_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut updates = state.controller.subscribe();

    let stream = async_stream::stream! {
        loop {
            let snapshot = updates.borrow_and_update().clone();
            let json = serde_json::to_string(&snapshot).unwrap_or_default();
            yield Ok::<_, Infallible>(Event::default().event("snapshot").data(json));

            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
