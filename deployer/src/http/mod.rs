//! HTTP client

pub mod client;
