//! A grounded documentation chat: one conversation, streamed answers, cited sources.

// Forbid unsafe or non-idiomatic practices
#![deny(warnings)] // Every warning is an error
#![deny(unsafe_code)] // No unsafe code
#![deny(missing_docs)] // Every public item must be documented
#![deny(dead_code)] // No unused code
#![deny(non_camel_case_types)]
// Types follow CamelCase

// Nothing slips through
#![deny(unused_imports)]
#![deny(unused_variables)]
#![deny(unused_must_use)] // Results and Options are handled explicitly
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)] // No unwrap()
#![deny(clippy::expect_used)] // No expect()
#![deny(clippy::panic)] // No panic!()
#![deny(clippy::print_stdout)] // Log through tracing
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::missing_const_for_fn)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]

// Robustness
#![deny(overflowing_literals)]

/// Conversation state, streaming accumulation and citation handling.
#[allow(clippy::significant_drop_tightening, clippy::missing_const_for_fn)]
pub mod chat;
/// Runtime configuration read from the environment.
pub mod config;
/// Generation service adapters and their streaming wire format.
#[allow(clippy::missing_const_for_fn)]
pub mod llm;
/// HTTP server and API routes.
#[allow(
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::unused_async
)]
pub mod server;
/// Entry helpers to start the docs chat server.
pub mod start_docs_chat;
