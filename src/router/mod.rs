//! Router Module
//!
//! API key rotation and model selection.

pub mod key_pool;
pub mod models;

pub use key_pool::{ApiKey, KeyPool, KeyPoolStats};
pub use models::{ModelCatalog, DEFAULT_MODELS};
