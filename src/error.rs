//! Chat Relay Error Types
//!
//! Public errors returned to callers, plus the per-attempt classification
//! the dispatcher uses to decide whether a key gets blacklisted.

use thiserror::Error;

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid JSON, unreadable file, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The resolved key pool is empty
    #[error("No API keys configured. Set CHAT_RELAY_API_KEYS or add `api_keys` to the config file")]
    NoKeysConfigured,

    /// `send` was called without any messages
    #[error("Conversation must contain at least one message")]
    EmptyConversation,

    /// Guest chat was called with an empty message
    #[error("Message is required")]
    EmptyMessage,

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Every key in the pool was tried and none produced a completion.
    /// Upstream detail is logged, never carried here.
    #[error("Unable to get response from AI service: service temporarily unavailable. Please try again later.")]
    Unavailable,
}

/// Outcome of a single failed upstream attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Upstream rejected the credential (HTTP 401/403)
    #[error("authorization rejected with status {status}")]
    Authorization { status: u16 },

    /// Timeout, connection error, non-auth error status, or unusable body
    #[error("{0}")]
    Transient(String),
}

impl AttemptError {
    /// Classify an HTTP status that was not a success
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => AttemptError::Authorization { status },
            _ => AttemptError::Transient(format!(
                "upstream returned status {}: {}",
                status,
                truncate(body, 500)
            )),
        }
    }

    /// Whether this failure should blacklist the key that was used
    pub fn is_authorization(&self) -> bool {
        matches!(self, AttemptError::Authorization { .. })
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Transient(format!("request timed out: {}", err))
        } else if err.is_connect() {
            AttemptError::Transient(format!("connection failed: {}", err))
        } else if err.is_decode() {
            AttemptError::Transient(format!("failed to decode response: {}", err))
        } else {
            AttemptError::Transient(err.to_string())
        }
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
