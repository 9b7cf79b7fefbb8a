//! Bearer-token acquisition.
//!
//! Two shapes of credential: a raw access token (useful for short sessions
//! and tests), or a refresh token that is exchanged at Google's token
//! endpoint whenever the cached access token nears expiry. The refresh
//! round-trip goes through the same [`HttpClient`] as every other call, so
//! it inherits the configured timeout.

use std::time::{Duration, Instant};

use http::{header, HeaderValue, Method};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::DriveError;
use crate::http_client::{HttpClient, HttpRequest};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Credentials used to authorize Drive calls.
pub enum Credentials {
    /// A ready access token. No refresh is attempted when it expires.
    AccessToken(SecretString),
    /// An offline grant; access tokens are minted on demand.
    Refresh {
        /// OAuth client id.
        client_id: String,
        /// OAuth client secret.
        client_secret: SecretString,
        /// Long-lived refresh token.
        refresh_token: SecretString,
    },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Produces `Authorization: Bearer …` values, refreshing as needed.
pub(crate) struct TokenSource {
    credentials: Credentials,
    cached: tokio::sync::Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub(crate) fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: tokio::sync::Mutex::new(None),
        }
    }

    /// The current bearer header value. Refreshes behind a mutex so that
    /// concurrent expired callers perform a single token round-trip.
    pub(crate) async fn header_value<C: HttpClient>(
        &self,
        http: &C,
    ) -> Result<HeaderValue, DriveError> {
        let token = match &self.credentials {
            Credentials::AccessToken(t) => t.expose_secret().to_owned(),
            Credentials::Refresh { .. } => {
                let mut cached = self.cached.lock().await;
                let expired = cached
                    .as_ref()
                    .is_none_or(|c| c.expires_at <= Instant::now());
                if expired {
                    *cached = Some(self.refresh(http).await?);
                }
                cached
                    .as_ref()
                    .map(|c| c.token.expose_secret().to_owned())
                    .unwrap_or_default()
            }
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| DriveError::Auth(e.to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn refresh<C: HttpClient>(&self, http: &C) -> Result<CachedToken, DriveError> {
        let Credentials::Refresh {
            client_id,
            client_secret,
            refresh_token,
        } = &self.credentials
        else {
            unreachable!("refresh is only reached with refresh credentials");
        };

        debug!("refreshing access token");
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
        ]
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let mut request = HttpRequest::new(Method::POST, TOKEN_ENDPOINT);
        request.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        request.body = Some(form.into_bytes().into());

        let response = http.send(request).await?;
        if !response.status.is_success() {
            return Err(DriveError::Auth(format!(
                "token endpoint returned {}",
                response.status
            )));
        }
        let parsed: TokenResponse = serde_json::from_slice(&response.body)?;
        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
        Ok(CachedToken {
            token: SecretString::from(parsed.access_token),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }
}
