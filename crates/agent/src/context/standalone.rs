//! Standalone-question rewrite request.

use ragrelay_core::message::Message;
use ragrelay_core::provider::ProviderRequest;

pub const DEFAULT_INSTRUCTIONS: &str = "Given a chat history and the user's last question that may reference \
the context in the chat history, formulate a standalone question that can be understood without the chat \
history. DO NOT answer the question, just reformulate it if necessary and, otherwise, return it as it is.";

/// Build the rewrite call: instructions, prior dialogue, then the new message.
///
/// Tool plumbing is left out of the history; only user and assistant text
/// matters for rephrasing.
pub fn rewrite_request(
    model: &str,
    instructions: Option<&str>,
    history: &[Message],
    message: &str,
) -> ProviderRequest {
    let instructions = instructions
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .unwrap_or(DEFAULT_INSTRUCTIONS);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(instructions));
    messages.extend(history.iter().filter(|m| m.is_dialogue()).cloned());
    messages.push(Message::user(message));

    let mut request = ProviderRequest::new(model, messages);
    request.temperature = 0.0;
    request
}
