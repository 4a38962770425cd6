//! API Module
//!
//! Chat completion wire types and conversation assembly.

pub mod completion;
pub mod conversation;

pub use completion::{Choice, ChoiceMessage, CompletionRequest, CompletionResponse, Message, Role};
pub use conversation::{context_window, guest_messages, DEFAULT_HISTORY_LIMIT};
