//! # Data Retrieval Module
//!
//! Generic HTTP plumbing shared by outbound integrations. The weather
//! provider builds on `ApiClient` rather than talking to `reqwest` directly,
//! so retries, timeouts and error mapping live in one place.

#![forbid(unsafe_code)]

/// JSON API client with retry middleware and a bounded timeout.
pub mod http_client;

pub use http_client::{ApiClient, ApiResponse, ClientSettings, RetrieveError};
