//! # Data Retrieval Module
//!
//! HTTP access to the lock contention API.
//!
//! - **`ky_http`**: a generic JSON `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, with optional retries for transient failures.
//! - **`lock_api`**: typed endpoints of the dashboard API on top of `ApiClient`.

/// Generic HTTP API client with retry middleware.
pub mod ky_http;
/// Typed client for the lock contention endpoints.
pub mod lock_api;

pub use ky_http::{ApiClient, ApiClientOptions, ApiResponse};
pub use lock_api::LockApi;
