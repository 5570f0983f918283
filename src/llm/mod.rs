//! Generation adapter: turns a conversation into a streamed, grounded answer.
//!
//! The adapter owns no state. It builds one request per call (injecting the
//! domain restriction and system directive) and hands back the service's
//! partial results unmodified, as a lazy single-pass stream.

pub mod error;
pub mod gemini;
pub mod sse;

pub use error::{GenerationError, GenerationResult};
pub use gemini::GeminiClient;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::chat::types::Content;

/// One cited web page as reported inside a partial result.
///
/// Both fields are optional on the wire; citations without a URI are dropped
/// during deduplication.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CitationFragment {
    /// Page URI.
    pub uri: Option<String>,
    /// Page title.
    pub title: Option<String>,
}

impl CitationFragment {
    /// Citation with both URI and title.
    #[must_use]
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            title: Some(title.into()),
        }
    }
}

/// One increment of a streamed response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    /// New text, if this increment carries any.
    pub text_fragment: Option<String>,
    /// Citations reported with this increment, in service order.
    pub citation_fragments: Vec<CitationFragment>,
}

impl PartialResult {
    /// Increment carrying only text.
    #[must_use]
    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            text_fragment: Some(fragment.into()),
            citation_fragments: Vec::new(),
        }
    }

    /// Increment carrying only citations.
    #[must_use]
    pub const fn citations(citation_fragments: Vec<CitationFragment>) -> Self {
        Self {
            text_fragment: None,
            citation_fragments,
        }
    }
}

/// Lazy, non-restartable sequence of partial results.
pub type PartialResultStream =
    Pin<Box<dyn Stream<Item = GenerationResult<PartialResult>> + Send + 'static>>;

/// Boundary to the hosted generation service.
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Issue one grounded, streamed request for `new_message` given `history`.
    ///
    /// # Errors
    /// Returns an error if the request cannot be established. Failures while
    /// consuming the stream arrive as `Err` items.
    async fn stream_response(
        &self,
        history: &[Content],
        new_message: &str,
    ) -> GenerationResult<PartialResultStream>;
}
