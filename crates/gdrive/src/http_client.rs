//! HTTP transport abstraction.
//!
//! The Drive endpoints are query-string heavy (`q`, `fields`, `pageToken`,
//! `uploadType`, …), so requests carry their query pairs unencoded and the
//! backend is responsible for percent-encoding them into the final URL.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::future::Future;

use crate::error::HttpClientError;

/// An HTTP request to be sent by an [`HttpClient`] implementation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: Method,
    /// Scheme, host and path, without a query string.
    pub url: String,
    /// Query pairs, unencoded.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// A bodyless request for `url` with no query parameters.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The full URL with the percent-encoded query string appended.
    #[must_use]
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let qs = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, qs)
    }
}

/// An HTTP response returned by an [`HttpClient`] implementation.
#[derive(Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body bytes.
    pub body: Bytes,
}

/// Trait for pluggable HTTP transports.
pub trait HttpClient: Send + Sync {
    /// Send an HTTP request and return the response.
    ///
    /// Transport-level failures (timeouts, connection resets) surface as
    /// [`HttpClientError`]; non-2xx statuses are returned as responses and
    /// classified by the caller.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, HttpClientError>> + Send;
}
