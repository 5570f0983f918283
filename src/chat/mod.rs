//! Chat domain: transcript types, stream accumulation and the conversation controller.

pub mod accumulator;
pub mod controller;
pub mod sources;
pub mod types;

pub use accumulator::{StreamAccumulator, TurnOutput, fold_stream};
pub use controller::{
    ConversationController, ConversationSnapshot, RejectReason, SendOutcome, TurnState,
};
pub use sources::dedup_sources;
pub use types::{Content, ContentPart, Message, MessageId, Role, Sender, Source};
