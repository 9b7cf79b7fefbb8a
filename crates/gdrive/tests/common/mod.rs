#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use secrecy::SecretString;

use gdrive::auth::Credentials;
use gdrive::{DriveClient, HttpClient, HttpClientError, HttpRequest, HttpResponse};

/// Script entry: the handler gets the request and its 0-based call index.
pub type Handler = dyn Fn(&HttpRequest, usize) -> HttpResponse + Send + Sync;

/// An [`HttpClient`] that answers from a closure and records every request.
#[derive(Clone)]
pub struct ScriptedHttp {
    handler: Arc<Handler>,
    calls: Arc<AtomicUsize>,
    pub requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedHttp {
    pub fn new(handler: impl Fn(&HttpRequest, usize) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.handler)(&request, index))
    }
}

/// A client over `http` with a static token, so no token round-trips occur.
pub fn client(http: ScriptedHttp) -> DriveClient<ScriptedHttp> {
    DriveClient::new(
        http,
        Credentials::AccessToken(SecretString::from("test-token".to_owned())),
    )
}

pub fn json(status: StatusCode, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

pub fn bytes_response(status: StatusCode, body: &[u8]) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: Bytes::copy_from_slice(body),
    }
}

/// The value of one query parameter, if present.
pub fn query_param<'r>(request: &'r HttpRequest, key: &str) -> Option<&'r str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Pull `'<id>' in parents`, `name = '<name>'` and the folder clause out of
/// a `q` filter. Enough structure for fixtures; not a real parser.
pub struct ParsedQuery {
    pub parent: Option<String>,
    pub name: Option<String>,
    pub folders_only: bool,
}

pub fn parse_q(q: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery {
        parent: None,
        name: None,
        folders_only: false,
    };
    for clause in q.split(" and ") {
        if let Some(rest) = clause.strip_prefix('\'') {
            if let Some(id) = rest.strip_suffix("' in parents") {
                parsed.parent = Some(id.to_owned());
            }
        } else if let Some(rest) = clause.strip_prefix("name = '") {
            if let Some(name) = rest.strip_suffix('\'') {
                parsed.name = Some(name.to_owned());
            }
        } else if clause.contains("vnd.google-apps.folder") {
            parsed.folders_only = true;
        }
    }
    parsed
}

/// Render a single-page `files.list` body from `(id, name, is_folder)` rows.
pub fn page_body(rows: &[(&str, &str, bool)], next_token: Option<&str>) -> String {
    let files = rows
        .iter()
        .map(|(id, name, is_dir)| {
            let mime = if *is_dir {
                "application/vnd.google-apps.folder"
            } else {
                "text/plain"
            };
            format!(r#"{{"id":"{id}","name":"{name}","mimeType":"{mime}"}}"#)
        })
        .collect::<Vec<_>>()
        .join(",");
    match next_token {
        Some(token) => format!(r#"{{"files":[{files}],"nextPageToken":"{token}"}}"#),
        None => format!(r#"{{"files":[{files}]}}"#),
    }
}
