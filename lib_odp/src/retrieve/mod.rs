//! # Data Retrieval Module
//!
//! Generic HTTP plumbing shared by the provider clients: request building,
//! authentication, retries with exponential backoff, and JSON handling.

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;

pub use ky_http::{ApiClient, ApiResponse, AuthScheme, RetrieveError};
