//! The remote side of the bridge, as the filesystem core sees it.
//!
//! A trait boundary so the core can run against an in-memory fake in tests;
//! the one production implementation delegates to [`gdrive::DriveClient`].

use std::future::Future;

use gdrive::query::Query;
use gdrive::{DriveClient, DriveError, DriveFile, FileList, HttpClient};

/// Everything the filesystem needs from Drive.
pub trait Remote: Send + Sync + 'static {
    /// One page of the children of `parent_id`, optionally restricted to an
    /// exact name.
    fn list_page(
        &self,
        parent_id: &str,
        name: Option<&str>,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<FileList, DriveError>> + Send;

    /// Metadata for one object.
    fn get_file(&self, id: &str) -> impl Future<Output = Result<DriveFile, DriveError>> + Send;

    /// Full content of one object.
    fn download(&self, id: &str) -> impl Future<Output = Result<Vec<u8>, DriveError>> + Send;

    /// Replace an object's content; returns the refreshed metadata.
    fn upload(
        &self,
        id: &str,
        content: &[u8],
    ) -> impl Future<Output = Result<DriveFile, DriveError>> + Send;

    /// Create a file or folder under `parent_id`.
    fn create(
        &self,
        parent_id: &str,
        name: &str,
        is_dir: bool,
    ) -> impl Future<Output = Result<DriveFile, DriveError>> + Send;

    /// Remove `parent_id` from the object's parent set.
    fn remove_parent(
        &self,
        id: &str,
        parent_id: &str,
    ) -> impl Future<Output = Result<(), DriveError>> + Send;
}

/// The production [`Remote`] over the Drive API.
pub struct DriveRemote<C: HttpClient> {
    client: DriveClient<C>,
}

impl<C: HttpClient> DriveRemote<C> {
    #[must_use]
    pub fn new(client: DriveClient<C>) -> Self {
        Self { client }
    }
}

impl<C: HttpClient + 'static> Remote for DriveRemote<C> {
    async fn list_page(
        &self,
        parent_id: &str,
        name: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut query = Query::new().in_parent(parent_id);
        if let Some(name) = name {
            query = query.named(name);
        }
        self.client.list_page(&query, page_token).await
    }

    async fn get_file(&self, id: &str) -> Result<DriveFile, DriveError> {
        self.client.get(id).await
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>, DriveError> {
        self.client.download(id).await
    }

    async fn upload(&self, id: &str, content: &[u8]) -> Result<DriveFile, DriveError> {
        self.client.update_media(id, content).await
    }

    async fn create(&self, parent_id: &str, name: &str, is_dir: bool) -> Result<DriveFile, DriveError> {
        self.client.create(name, parent_id, is_dir).await
    }

    async fn remove_parent(&self, id: &str, parent_id: &str) -> Result<(), DriveError> {
        self.client.remove_parent(id, parent_id).await
    }
}
