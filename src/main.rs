//! Binary entrypoint that serves the documentation chat.

use std::process::ExitCode;

use docs_chat::start_docs_chat;

/// Read the environment, then serve the chat page and API until stopped.
fn main() -> ExitCode {
    start_docs_chat::run()
}
