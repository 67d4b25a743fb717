//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`.
//! It includes middleware support for exponential backoff retries and standardized
//! JSON response handling.

use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures below the level of API semantics.
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with the status of the
/// HTTP transaction.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
}

/// How the client authenticates each request.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// A named header carrying the raw token, e.g. Pushbullet's `Access-Token`.
    Header(HeaderName, String),
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs,
/// authentication tokens, and automatic retries.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// Optional authentication applied to every request.
    auth: Option<AuthScheme>,
}

impl ApiClient {
    /// Creates a new `ApiClient` instance with a retry policy.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "https://api.example.com/v1/").
    ///   A trailing slash is required for relative paths to join below it.
    /// * `auth` - Optional authentication for every request.
    pub fn new(base_url: &str, auth: Option<AuthScheme>) -> Result<Self, RetrieveError> {
        let url = Url::parse(base_url)?;

        // Configure an exponential backoff policy with 3 retries
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("odp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Construct the client with the retry middleware
        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth,
        })
    }

    /// Performs a generic HTTP request and handles the response.
    ///
    /// This method manages URL joining, header injection, authentication,
    /// and JSON serialization/deserialization. An empty success body (e.g. a
    /// `204`) is deserialized from JSON `null`, so `T` should be an `Option`
    /// or `serde_json::Value` for such endpoints.
    ///
    /// # Arguments
    /// * `method` - The HTTP verb (GET, POST, etc.).
    /// * `path` - The relative path to append to the base URL.
    /// * `query` - Query string pairs appended to the URL.
    /// * `body` - Optional serializable object to send as the JSON body.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, RetrieveError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        // 1. Construct the full absolute URL
        let mut full_url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = full_url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let mut req = self.inner.request(method, full_url);

        // 2. Inject authentication if configured
        if let Some(AuthScheme::Header(name, token)) = &self.auth {
            req = req.header(name.clone(), HeaderValue::from_str(token)?);
        }

        // 3. Serialize and attach the JSON body if present
        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        // 4. Execute the request and capture response metadata
        let response: reqwest::Response = req.send().await?;
        let status = response.status();

        // 5. Handle the result based on success status
        if status.is_success() {
            let bytes = response.bytes().await?;
            let data = if bytes.is_empty() {
                serde_json::from_str::<T>("null")?
            } else {
                serde_json::from_slice::<T>(&bytes)?
            };
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
            })
        } else {
            // Capture the error body as a string for debugging
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
            })
        }
    }
}
