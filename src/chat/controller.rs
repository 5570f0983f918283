//! Conversation controller: owns the transcript, the history and the turn gate.
//!
//! A turn moves through an explicit lifecycle:
//!
//! ```text
//! Idle/Failed --send--> InFlight --stream end--> Committing --> Idle
//!                          |                          |
//!                          +------- any error --------+--> Failed
//! ```
//!
//! Only one turn can be in flight. A send while `InFlight` or `Committing` is
//! rejected, never queued. Locks are held only for short synchronous sections
//! and never across an `.await`.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::watch;

use crate::chat::accumulator::{TurnOutput, fold_stream};
use crate::chat::types::{Content, Message, MessageId};
use crate::llm::{GenerationAdapter, GenerationError};

/// Shown when an error carries no description.
const UNKNOWN_ERROR: &str = "An unknown error occurred.";
/// Reason recorded when a turn future is dropped before it resolves.
const INTERRUPTED: &str = "the response was interrupted before it completed";

/// Lifecycle of the current turn.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnState {
    /// No turn running.
    #[default]
    Idle,
    /// Streaming into the placeholder message.
    InFlight {
        /// Placeholder being written.
        message_id: MessageId,
    },
    /// Stream exhausted; sources and history are being finalized.
    Committing {
        /// Placeholder being finalized.
        message_id: MessageId,
    },
    /// Last turn failed. New sends are accepted.
    Failed {
        /// Failure description.
        reason: String,
    },
}

impl TurnState {
    /// Whether a turn currently holds the gate.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::InFlight { .. } | Self::Committing { .. })
    }
}

/// Why a send was ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Input was empty or whitespace only.
    BlankInput,
    /// Another turn is still running.
    TurnInFlight,
}

/// What happened to a send. Callers are free to ignore it; failures are
/// already reflected in the controller's error indicator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SendOutcome {
    /// Nothing was changed.
    Rejected(RejectReason),
    /// The turn was committed to transcript and history.
    Completed {
        /// Finalized model message.
        message_id: MessageId,
    },
    /// The placeholder was discarded and the error indicator set.
    Failed {
        /// Error indicator text.
        error: String,
    },
}

/// Everything a presentation layer needs to render the chat.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    /// Transcript, oldest first.
    pub messages: Vec<Message>,
    /// Current turn lifecycle.
    pub state: TurnState,
    /// Error indicator from the last failed turn.
    pub error: Option<String>,
    /// Whether a turn is in flight.
    pub is_loading: bool,
}

#[derive(Debug, Default)]
struct ConversationState {
    transcript: Vec<Message>,
    history: Vec<Content>,
    turn: TurnState,
    error: Option<String>,
}

impl ConversationState {
    fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.transcript.iter_mut().find(|m| m.id == id)
    }

    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.transcript.clone(),
            state: self.turn.clone(),
            error: self.error.clone(),
            is_loading: self.turn.is_busy(),
        }
    }
}

/// Format a failure the way it is shown to the user.
fn error_indicator(description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        format!("Error: {UNKNOWN_ERROR}")
    } else {
        format!("Error: {description}")
    }
}

/// Coordinates one conversation with the generation service.
pub struct ConversationController {
    adapter: Arc<dyn GenerationAdapter>,
    state: RwLock<ConversationState>,
    updates: watch::Sender<ConversationSnapshot>,
}

impl ConversationController {
    /// Create a controller with an empty conversation.
    #[must_use]
    pub fn new(adapter: Arc<dyn GenerationAdapter>) -> Self {
        let (updates, _) = watch::channel(ConversationSnapshot::default());
        Self {
            adapter,
            state: RwLock::new(ConversationState::default()),
            updates,
        }
    }

    /// Current view of the conversation.
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Receive a fresh snapshot after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.updates.subscribe()
    }

    /// Displayed messages, oldest first.
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        self.read(|s| s.transcript.clone())
    }

    /// Completed turns as sent to the generation service.
    #[must_use]
    pub fn history(&self) -> Vec<Content> {
        self.read(|s| s.history.clone())
    }

    /// Error indicator from the last failed turn.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    /// Current turn lifecycle.
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.read(|s| s.turn.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&ConversationState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConversationState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ConversationState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Send one user turn and stream the grounded answer into the transcript.
    ///
    /// Never fails: blank input and sends during a running turn are ignored,
    /// and generation failures end up in the error indicator.
    pub async fn send_turn(&self, input_text: &str) -> SendOutcome {
        match self.begin_turn(input_text) {
            Ok((message_id, history)) => self.drive_turn(message_id, &history, input_text).await,
            Err(reason) => SendOutcome::Rejected(reason),
        }
    }

    /// Like [`send_turn`](Self::send_turn), but streams on a background task.
    ///
    /// The gate is checked before returning, so a rejection is reported
    /// synchronously and nothing is spawned for it.
    ///
    /// # Errors
    /// Returns the rejection reason when the input is blank or a turn is running.
    pub fn spawn_turn(self: &Arc<Self>, input_text: String) -> Result<MessageId, RejectReason> {
        let (message_id, history) = self.begin_turn(&input_text)?;
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller
                .drive_turn(message_id, &history, &input_text)
                .await
        });
        Ok(message_id)
    }

    /// Check the gate and, if open, append the user message and the placeholder.
    fn begin_turn(&self, input_text: &str) -> Result<(MessageId, Vec<Content>), RejectReason> {
        if input_text.trim().is_empty() {
            tracing::debug!("ignoring blank input");
            return Err(RejectReason::BlankInput);
        }

        let mut state = self.write();
        if state.turn.is_busy() {
            tracing::debug!("ignoring send while a turn is in flight");
            return Err(RejectReason::TurnInFlight);
        }

        state.error = None;
        state.transcript.push(Message::user(input_text));
        let placeholder = Message::model_placeholder();
        let message_id = placeholder.id;
        state.transcript.push(placeholder);
        state.turn = TurnState::InFlight { message_id };
        self.publish(&state);
        Ok((message_id, state.history.clone()))
    }

    async fn drive_turn(
        &self,
        message_id: MessageId,
        history: &[Content],
        input_text: &str,
    ) -> SendOutcome {
        let guard = TurnGuard {
            controller: self,
            message_id,
            armed: true,
        };

        match self.stream_turn(message_id, history, input_text).await {
            Ok(output) => {
                guard.commit(input_text, output);
                SendOutcome::Completed { message_id }
            }
            Err(err) => {
                tracing::warn!(%message_id, "generation failed: {err}");
                let error = guard.fail(&err.to_string());
                SendOutcome::Failed { error }
            }
        }
    }

    /// Consume the stream, mirroring the running text into the placeholder.
    async fn stream_turn(
        &self,
        message_id: MessageId,
        history: &[Content],
        input_text: &str,
    ) -> Result<TurnOutput, GenerationError> {
        let stream = self.adapter.stream_response(history, input_text).await?;
        let output = fold_stream(stream, |accumulator| {
            let mut state = self.write();
            if let Some(message) = state.message_mut(message_id) {
                message.text.clear();
                message.text.push_str(accumulator.text());
            }
            self.publish(&state);
        })
        .await?;

        let mut state = self.write();
        state.turn = TurnState::Committing { message_id };
        self.publish(&state);

        tracing::debug!(%message_id, sources = output.sources.len(), "stream exhausted");
        Ok(output)
    }

    /// Apply the final text and sources and append the turn to history.
    fn commit(&self, message_id: MessageId, input_text: &str, output: TurnOutput) {
        let mut state = self.write();
        let source_count = output.sources.len();
        if let Some(message) = state.message_mut(message_id) {
            message.text.clone_from(&output.text);
            message.sources = output.sources;
        }
        state.history.push(Content::user(input_text));
        state.history.push(Content::model(output.text));
        state.turn = TurnState::Idle;
        self.publish(&state);

        tracing::info!(
            %message_id,
            sources = source_count,
            history_len = state.history.len(),
            "turn committed"
        );
    }

    /// Drop the placeholder, keep the user's message, and raise the error indicator.
    fn roll_back(&self, message_id: MessageId, description: &str) -> String {
        let error = error_indicator(description);
        let mut state = self.write();
        state.transcript.retain(|m| m.id != message_id);
        state.error = Some(error.clone());
        state.turn = TurnState::Failed {
            reason: description.to_string(),
        };
        self.publish(&state);
        error
    }
}

/// Releases the turn gate however the turn ends, including when the
/// `send_turn` future is dropped mid-stream.
struct TurnGuard<'a> {
    controller: &'a ConversationController,
    message_id: MessageId,
    armed: bool,
}

impl TurnGuard<'_> {
    fn commit(mut self, input_text: &str, output: TurnOutput) {
        self.armed = false;
        self.controller.commit(self.message_id, input_text, output);
    }

    fn fail(mut self, description: &str) -> String {
        self.armed = false;
        self.controller.roll_back(self.message_id, description)
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(message_id = %self.message_id, "turn dropped before completion");
            self.controller.roll_back(self.message_id, INTERRUPTED);
        }
    }
}
