//! The Drive client and its shared request plumbing.

use std::sync::Arc;

use http::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::error;

use crate::auth::{Credentials, TokenSource};
use crate::error::DriveError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};

const BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// An authorized Drive v3 client.
///
/// Cheap to clone; all clones share the HTTP backend and token cache.
pub struct DriveClient<C: HttpClient> {
    pub(crate) inner: Arc<ClientInner<C>>,
}

impl<C: HttpClient> Clone for DriveClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ClientInner<C> {
    pub(crate) http: C,
    pub(crate) base_url: String,
    pub(crate) upload_base_url: String,
    token: TokenSource,
}

impl<C: HttpClient> DriveClient<C> {
    /// Create a client against the production Drive endpoints.
    pub fn new(http: C, credentials: Credentials) -> Self {
        Self::with_base_urls(http, credentials, BASE_URL, UPLOAD_BASE_URL)
    }

    /// Create a client against custom endpoints, e.g. a local test server.
    pub fn with_base_urls(
        http: C,
        credentials: Credentials,
        base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base_url.into(),
                upload_base_url: upload_base_url.into(),
                token: TokenSource::new(credentials),
            }),
        }
    }
}

impl<C: HttpClient> ClientInner<C> {
    /// Attach the bearer header and send, without status classification.
    pub(crate) async fn send_raw(
        &self,
        mut request: HttpRequest,
    ) -> Result<HttpResponse, DriveError> {
        let bearer = self.token.header_value(&self.http).await?;
        request.headers.insert(header::AUTHORIZATION, bearer);

        let method = request.method.clone();
        let url = request.url.clone();
        self.http.send(request).await.map_err(|err| {
            error!(%method, %url, %err, "transport failure");
            DriveError::Http(err)
        })
    }

    /// Attach the bearer header, send, and classify non-2xx statuses.
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DriveError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let response = self.send_raw(request).await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(DriveError::NotFound);
        }
        if !response.status.is_success() {
            let message = String::from_utf8_lossy(&response.body)
                .chars()
                .take(512)
                .collect::<String>();
            error!(%method, %url, status = %response.status, %message, "drive api error");
            return Err(DriveError::Api {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }

    /// Send and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, DriveError> {
        let response = self.send(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// A request for a path under the metadata endpoint.
    pub(crate) fn request(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{path}", self.base_url))
    }

    /// A request for a path under the media upload endpoint.
    pub(crate) fn upload_request(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{path}", self.upload_base_url))
    }
}
