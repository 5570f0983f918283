//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::chat::ConversationController;
use crate::config::ChatConfig;
use crate::llm::{GeminiClient, GenerationAdapter, GenerationError};

/// Shared application state.
pub struct AppState {
    /// The single conversation this process serves.
    pub controller: Arc<ConversationController>,
    /// Configuration the server was started with.
    pub config: ChatConfig,
}

impl AppState {
    /// Create a new application state backed by the Gemini client.
    ///
    /// # Errors
    /// Returns an error if the Gemini client cannot be created.
    pub fn new(config: ChatConfig) -> Result<Arc<Self>, GenerationError> {
        let gemini = GeminiClient::new(&config)?;
        Ok(Self::with_adapter(config, Arc::new(gemini)))
    }

    /// Create a state around any generation adapter.
    #[must_use]
    pub fn with_adapter(config: ChatConfig, adapter: Arc<dyn GenerationAdapter>) -> Arc<Self> {
        Arc::new(Self {
            controller: Arc::new(ConversationController::new(adapter)),
            config,
        })
    }
}
