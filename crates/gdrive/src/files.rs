//! File operations: list, get, download, create, media update, unparenting.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use tracing::{debug, debug_span, Instrument as _};

use crate::client::{ClientInner, DriveClient};
use crate::error::DriveError;
use crate::http_client::{HttpClient, HttpRequest};
use crate::models::{DriveFile, FileList, NewFile, FILE_FIELDS, FOLDER_MIME_TYPE, PAGE_SIZE};
use crate::query::Query;
use crate::trace::TraceId;

/// Media uploads are sent in chunks of this many bytes.
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// `fields` projection for list calls: page token plus per-file metadata.
fn list_fields() -> String {
    format!("nextPageToken, files({FILE_FIELDS})")
}

impl<C: HttpClient> DriveClient<C> {
    /// Stream the files matching `query`, fetching pages lazily.
    #[must_use]
    pub fn list(&self, query: Query) -> FileStream<C> {
        FileStream::new(Arc::clone(&self.inner), query)
    }

    /// Fetch a single page of the files matching `query`.
    pub async fn list_page(
        &self,
        query: &Query,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let q = query.build();
        let span = debug_span!("list_page", trace = %TraceId::new(), q = %q);
        async {
            let mut request = self.inner.request(Method::GET, "/files");
            request.query.push(("q".into(), q.clone()));
            request
                .query
                .push(("pageSize".into(), PAGE_SIZE.to_string()));
            request.query.push(("corpora".into(), "user".into()));
            request.query.push(("orderBy".into(), "folder,name".into()));
            request.query.push(("fields".into(), list_fields()));
            if let Some(token) = page_token {
                request.query.push(("pageToken".into(), token.to_owned()));
            }

            let page: FileList = self.inner.send_json(request).await?;
            debug!(count = page.files.len(), "page received");
            Ok(page)
        }
        .instrument(span)
        .await
    }

    /// Fetch one object's metadata by id.
    pub async fn get(&self, id: &str) -> Result<DriveFile, DriveError> {
        let span = debug_span!("get", trace = %TraceId::new(), id);
        async {
            let mut request = self.inner.request(Method::GET, &format!("/files/{id}"));
            request
                .query
                .push(("fields".into(), FILE_FIELDS.to_owned()));
            self.inner.send_json(request).await
        }
        .instrument(span)
        .await
    }

    /// Download an object's full content.
    pub async fn download(&self, id: &str) -> Result<Vec<u8>, DriveError> {
        let span = debug_span!("download", trace = %TraceId::new(), id);
        async {
            let mut request = self.inner.request(Method::GET, &format!("/files/{id}"));
            request.query.push(("alt".into(), "media".into()));
            let response = self.inner.send(request).await?;
            debug!(read = response.body.len(), "downloaded");
            Ok(response.body.to_vec())
        }
        .instrument(span)
        .await
    }

    /// Create a file or folder named `name` under `parent_id`.
    pub async fn create(
        &self,
        name: &str,
        parent_id: &str,
        is_dir: bool,
    ) -> Result<DriveFile, DriveError> {
        let span = debug_span!("create", trace = %TraceId::new(), name, parent_id, is_dir);
        async {
            let body = NewFile {
                name,
                parents: [parent_id],
                mime_type: is_dir.then_some(FOLDER_MIME_TYPE),
            };
            let mut request = self.inner.request(Method::POST, "/files");
            request
                .query
                .push(("fields".into(), FILE_FIELDS.to_owned()));
            request.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            request.body = Some(serde_json::to_vec(&body)?.into());
            self.inner.send_json(request).await
        }
        .instrument(span)
        .await
    }

    /// Replace an object's content, returning the refreshed metadata.
    ///
    /// Uses the resumable upload protocol: one initiation round-trip, then
    /// PUTs of [`UPLOAD_CHUNK_SIZE`] with `Content-Range` headers.
    pub async fn update_media(&self, id: &str, content: &[u8]) -> Result<DriveFile, DriveError> {
        let span =
            debug_span!("update_media", trace = %TraceId::new(), id, size = content.len());
        async {
            let mut initiate = self
                .inner
                .upload_request(Method::PATCH, &format!("/files/{id}"));
            initiate
                .query
                .push(("uploadType".into(), "resumable".into()));
            initiate
                .query
                .push(("fields".into(), FILE_FIELDS.to_owned()));
            let response = self.inner.send(initiate).await?;
            let session_url = response
                .headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| DriveError::Api {
                    status: response.status,
                    message: "upload initiation returned no session location".into(),
                })?
                .to_owned();

            self.upload_session(&session_url, content).await
        }
        .instrument(span)
        .await
    }

    /// Drive chunked-PUT loop. A 308 acknowledges the chunk; the final chunk
    /// answers 200 with the updated file metadata.
    async fn upload_session(
        &self,
        session_url: &str,
        content: &[u8],
    ) -> Result<DriveFile, DriveError> {
        let total = content.len();
        if total == 0 {
            let mut request = HttpRequest::new(Method::PUT, session_url);
            request.headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_static("bytes */0"),
            );
            return self.inner.send_json(request).await;
        }

        let mut offset = 0usize;
        loop {
            let end = (offset + UPLOAD_CHUNK_SIZE).min(total);
            let range = format!("bytes {offset}-{}/{total}", end - 1);
            let mut request = HttpRequest::new(Method::PUT, session_url);
            request.headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&range).map_err(|e| DriveError::Api {
                    status: StatusCode::BAD_REQUEST,
                    message: e.to_string(),
                })?,
            );
            request.body = Some(Bytes::copy_from_slice(&content[offset..end]));

            if end == total {
                let response = self.inner.send(request).await?;
                debug!(sent = total, "upload complete");
                return Ok(serde_json::from_slice(&response.body)?);
            }

            // Intermediate chunks answer 308 Resume Incomplete, which the
            // status classifier must not treat as a failure.
            let response = self.inner.send_raw(request).await?;
            if response.status != StatusCode::PERMANENT_REDIRECT {
                return Err(DriveError::Api {
                    status: response.status,
                    message: "unexpected status for intermediate chunk".into(),
                });
            }
            debug!(sent = end, total, "chunk acknowledged");
            offset = end;
        }
    }

    /// Remove `parent_id` from the object's parent set.
    ///
    /// When this was the only parent the object becomes unreachable from the
    /// mount, which is the closest Drive analog of deletion.
    pub async fn remove_parent(&self, id: &str, parent_id: &str) -> Result<(), DriveError> {
        let span = debug_span!("remove_parent", trace = %TraceId::new(), id, parent_id);
        async {
            let mut request = self.inner.request(Method::PATCH, &format!("/files/{id}"));
            request
                .query
                .push(("removeParents".into(), parent_id.to_owned()));
            request.query.push(("fields".into(), "id".into()));
            request.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            request.body = Some(Bytes::from_static(b"{}"));
            self.inner.send(request).await.map(drop)
        }
        .instrument(span)
        .await
    }
}

/// A lazily-paginated stream over `files.list` results.
///
/// Owns its state, so no lifetime ties it to the client. Dropping the stream
/// abandons pagination; errors from a page fetch surface from [`next`] and
/// leave previously-yielded items with the caller.
///
/// [`next`]: FileStream::next
pub struct FileStream<C: HttpClient> {
    client: DriveClient<C>,
    query: Query,
    page_token: Option<String>,
    buffer: VecDeque<DriveFile>,
    done: bool,
}

impl<C: HttpClient> FileStream<C> {
    fn new(inner: Arc<ClientInner<C>>, query: Query) -> Self {
        Self {
            client: DriveClient { inner },
            query,
            page_token: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Yield the next file, fetching a new page when the buffer drains.
    ///
    /// Returns `Ok(None)` once every page has been consumed. A page may be
    /// empty while more remain, so draining continues until a file turns up
    /// or the token runs out.
    pub async fn next(&mut self) -> Result<Option<DriveFile>, DriveError> {
        loop {
            if let Some(file) = self.buffer.pop_front() {
                return Ok(Some(file));
            }
            if self.done {
                return Ok(None);
            }
            match self.fetch_page().await? {
                Some(files) => self.buffer = VecDeque::from(files),
                None => return Ok(None),
            }
        }
    }

    /// Fetch the next whole page. `Ok(None)` when pagination is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<DriveFile>>, DriveError> {
        if self.done {
            return Ok(None);
        }
        self.fetch_page().await
    }

    async fn fetch_page(&mut self) -> Result<Option<Vec<DriveFile>>, DriveError> {
        let page = self
            .client
            .list_page(&self.query, self.page_token.as_deref())
            .await?;
        self.page_token = page.next_page_token;
        if self.page_token.is_none() {
            self.done = true;
        }
        Ok(Some(page.files))
    }
}
