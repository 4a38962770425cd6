//! Client Module
//!
//! HTTP transport for the upstream completion endpoint.

pub mod http;

pub use http::HttpClient;
