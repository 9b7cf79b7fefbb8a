//! Drive v3 wire models and magic constants.

use serde::{Deserialize, Deserializer, Serialize};

/// The magic id for the Drive root directory.
pub const ROOT_ID: &str = "root";

/// The mime type Drive assigns to folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Page size used by all list calls.
pub const PAGE_SIZE: u32 = 50;

/// The `fields` projection requested for file metadata.
pub const FILE_FIELDS: &str = "id, name, mimeType, size, createdTime, modifiedTime";

/// One Drive object, file or folder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Opaque object id.
    pub id: String,
    /// Display name within the parent.
    pub name: String,
    /// Mime type; folders carry [`FOLDER_MIME_TYPE`].
    #[serde(default)]
    pub mime_type: String,
    /// Content size in bytes. Drive encodes int64 fields as JSON strings.
    #[serde(default, deserialize_with = "int64_string")]
    pub size: Option<i64>,
    /// RFC 3339 creation time.
    #[serde(default)]
    pub created_time: Option<String>,
    /// RFC 3339 modification time.
    #[serde(default)]
    pub modified_time: Option<String>,
}

impl DriveFile {
    /// Whether this object is a folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// One page of a `files.list` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files on this page.
    #[serde(default)]
    pub files: Vec<DriveFile>,
    /// Token for the next page, absent on the last one.
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata body for `files.create`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewFile<'a> {
    pub name: &'a str,
    pub parents: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<&'a str>,
}

fn int64_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    match raw {
        None => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
