//! # HTTP Retrieval Utilities
//!
//! An asynchronous JSON API client wrapper around `reqwest`, with optional
//! retry middleware for transient failures and standardized response handling.

use std::time::Duration;

use reqwest::{header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE}, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::FetchError;

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
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
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    /// Converts a non-2xx response into `FetchError::Status`.
    pub fn into_result(self) -> Result<T, FetchError> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err(FetchError::Status {
                status: self.status,
                body: self.error_body,
            }),
        }
    }
}

/// Options for building an `ApiClient`.
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    /// Optional Bearer token for the Authorization header.
    pub auth_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries for transient failures. `0` disables the retry middleware's effect.
    pub max_retries: u32,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            timeout: Duration::from_secs(10),
            max_retries: 0,
        }
    }
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs,
/// authentication tokens, and automatic retries.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all endpoint segments are appended.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` rooted at `base_url`.
    ///
    /// # Errors
    /// Returns `FetchError::Url` if `base_url` is not an absolute URL,
    /// `FetchError::BaseUrl` if it cannot carry a path, or `FetchError::Build`
    /// if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, options: ApiClientOptions) -> Result<Self, FetchError> {
        let url = Url::parse(base_url)?;
        if url.cannot_be_a_base() {
            return Err(FetchError::BaseUrl(base_url.to_string()));
        }

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);

        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("lockfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Build)?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth_token: options.auth_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds an absolute URL by appending path segments (percent-encoded)
    /// and query pairs to the base URL.
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| FetchError::BaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Performs a generic HTTP request and handles the response.
    ///
    /// Non-2xx responses are returned as `ApiResponse { success: false, .. }`
    /// with the raw body captured; only network, encode and decode failures
    /// are errors.
    pub async fn request<T, B>(
        &self,
        method: Method,
        url: Url,
        headers: Option<HeaderMap>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, FetchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut req = self.inner.request(method, url);

        if let Some(h) = headers {
            req = req.headers(h);
        }

        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        if let Some(b) = body {
            let json_body = serde_json::to_string(b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }

    /// `GET` returning the decoded body, with non-2xx mapped to an error.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        self.request::<T, ()>(Method::GET, url, None, None).await?.into_result()
    }

    /// `POST` a JSON body and return the decoded response.
    pub async fn post_json<T, B>(&self, url: Url, body: &B) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request::<T, B>(Method::POST, url, None, Some(body)).await?.into_result()
    }
}
