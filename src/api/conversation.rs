//! Conversation Assembly
//!
//! Builds the outbound message list for guest chats and trims stored chat
//! history to the context window.

use crate::api::completion::Message;

/// Default number of stored messages sent as context
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Guest history followed by the new user message
pub fn guest_messages(history: &[Message], message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend(history.iter().cloned());
    messages.push(Message::user(message));
    messages
}

/// The most recent `limit` messages, oldest first
pub fn context_window(messages: &[Message], limit: usize) -> &[Message] {
    let start = messages.len().saturating_sub(limit);
    &messages[start..]
}
