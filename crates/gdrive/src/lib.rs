//! Minimal Google Drive v3 client.
//!
//! Exposes the handful of endpoints a filesystem bridge needs (list, get,
//! download, create, media update, parent removal) behind a pluggable
//! [`HttpClient`], so the whole crate can be exercised against a scripted
//! backend in tests.

pub mod auth;
mod backends;
mod client;
mod error;
mod files;
mod http_client;
mod models;
pub mod query;
mod resolver;
mod trace;

#[cfg(feature = "reqwest-client")]
pub use backends::ReqwestClient;
pub use client::DriveClient;
pub use error::{DriveError, HttpClientError};
pub use files::FileStream;
pub use http_client::{HttpClient, HttpRequest, HttpResponse};
pub use models::{DriveFile, FileList, FILE_FIELDS, FOLDER_MIME_TYPE, PAGE_SIZE, ROOT_ID};
pub use resolver::split_path;
pub use trace::TraceId;
