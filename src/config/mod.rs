//! Configuration Module
//!
//! Handles relay configuration loading and validation.

pub mod loader;
pub mod relay;

pub use loader::ConfigLoader;
pub use relay::{RelayConfig, DEFAULT_ENDPOINT};
