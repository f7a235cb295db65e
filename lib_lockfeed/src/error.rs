//! # Error Types
//!
//! Errors surfaced by the HTTP retrieval layer and by the live feed handle.
//! Inside the engine every failure is converted into feed state instead of
//! being returned, so these types mostly appear at construction time and in
//! the typed API client.

use thiserror::Error;

#[derive(Debug, Error)]
/// # Fetch Error
///
/// Failure of a single HTTP request against the lock contention API.
/// Every variant is transient from the point of view of the poll channel.
pub enum FetchError {
    /// The endpoint URL could not be constructed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The configured base URL cannot carry path segments (e.g. `mailto:`).
    #[error("base url '{0}' cannot be used as an API root")]
    BaseUrl(String),

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest_middleware::Error),

    /// The response body could not be decoded into the expected shape.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] reqwest::Error),

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The server answered with a non-2xx status.
    #[error("server responded with status {status}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Raw body returned alongside the failure, if any.
        body: Option<String>,
    },

    /// The underlying HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request was rejected before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
/// # Feed Error
///
/// Errors returned by the `LiveFeed` surface.
pub enum FeedError {
    /// Building the HTTP client for the poll channel failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint url '{url}': {source}")]
    InvalidUrl {
        /// The offending value as configured.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The poll channel needs a non-zero interval.
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    /// The engine task has stopped; no further state will be published.
    #[error("live feed has shut down")]
    Closed,
}
