//! Transcript and history types for the chat.
//!
//! Two parallel views of the conversation are kept:
//! - the **transcript** ([`Message`]) is what a browser renders, including
//!   the model message that is still streaming;
//! - the **history** ([`Content`]) is what the generation service receives on
//!   the next turn. It only ever holds completed turns.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a transcript message.
///
/// With feature `uuid_v7` enabled, new identifiers are time ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new identifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        #[cfg(feature = "uuid_v7")]
        {
            Self(Uuid::now_v7())
        }
        #[cfg(not(feature = "uuid_v7"))]
        {
            Self(Uuid::new_v4())
        }
    }
}

impl Default for MessageId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Who authored a transcript message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person typing in the browser.
    User,
    /// The generation service.
    Model,
}

impl Sender {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A web page the model drew upon.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Page URI, also the deduplication key.
    pub uri: String,
    /// Display label.
    pub title: String,
}

impl Source {
    /// Build a source; an empty or missing title falls back to the URI.
    #[must_use]
    pub fn new(uri: impl Into<String>, title: Option<&str>) -> Self {
        let uri = uri.into();
        let title = match title {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => uri.clone(),
        };
        Self { uri, title }
    }
}

/// A displayed chat message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Message text. Grows while the model message is streaming.
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Cited sources (model messages only).
    pub sources: Vec<Source>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            sender: Sender::User,
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Build the empty model message that streamed text is written into.
    #[must_use]
    pub fn model_placeholder() -> Self {
        Self {
            id: MessageId::new(),
            text: String::new(),
            sender: Sender::Model,
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Role of a history turn, as understood by the generation service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User turn.
    User,
    /// Model turn.
    Model,
}

/// A single text fragment of a history turn.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Fragment text.
    pub text: String,
}

/// A completed turn as sent back to the generation service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Author role.
    pub role: Role,
    /// Ordered text fragments.
    pub parts: Vec<ContentPart>,
}

impl Content {
    /// Single-part user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::single(Role::User, text)
    }

    /// Single-part model turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self::single(Role::Model, text)
    }

    fn single(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart { text: text.into() }],
        }
    }

    /// Concatenated text of all parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}
