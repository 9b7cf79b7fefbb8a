//! The filesystem core: every operation's semantics, minus kernel plumbing.
//!
//! `FsCore` owns the inode table and both cache tiers, and talks to Drive
//! through a [`Remote`]. The fuser adapter is a thin shim over these
//! methods; tests drive them directly against an in-memory remote.

use std::sync::Arc;

use fuser::{FileAttr, FUSE_ROOT_ID};
use gdrive::{DriveFile, TraceId};
use scc::hash_map::Entry;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::cache::TwoQueueCache;
use crate::entry::{synthetic_dir_attr, MetaEntry, Owner};
use crate::node::{DirNode, FileNode, FileState, Node};
use crate::remote::Remote;

/// Process-wide bound on cached metadata entries.
pub const ENTRY_CACHE_CAPACITY: usize = 1000;

/// The global id → metadata cache, shared by every mount.
pub type EntryCache = TwoQueueCache<String, MetaEntry>;

/// Operation failures, one variant per POSIX error the kernel can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    /// The object does not exist (or, for reads, could not be fetched).
    #[error("no such object")]
    NotFound,
    /// A create or mkdir target already resolves.
    #[error("name already exists")]
    AlreadyExists,
    /// The operation does not apply to this kind of node.
    #[error("operation not supported on this node")]
    NotSupported,
    /// A remote mutation failed.
    #[error("remote operation failed")]
    RemoteIo,
    /// A listing broke off partway through.
    #[error("listing interrupted")]
    Cancelled,
}

impl FsError {
    /// The errno reported to the kernel.
    #[must_use]
    pub fn errno(self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NotSupported => libc::ENOTSUP,
            FsError::RemoteIo => libc::EREMOTEIO,
            FsError::Cancelled => libc::ECANCELED,
        }
    }
}

/// One mounted tree's state and operations.
pub struct FsCore<R: Remote> {
    remote: Arc<R>,
    entries: Arc<EntryCache>,
    /// ino → node arena. The kernel addresses the mount root as
    /// [`FUSE_ROOT_ID`]; every other key is the id-derived inode number.
    nodes: scc::HashMap<u64, Node>,
    owner: Owner,
}

impl<R: Remote> FsCore<R> {
    /// Build a core rooted at the directory `root_id`.
    ///
    /// `entries` is shared across mounts; pass the same handle to each.
    pub fn new(remote: Arc<R>, entries: Arc<EntryCache>, root_id: String, owner: Owner) -> Self {
        let nodes = scc::HashMap::new();
        let root = Node::Dir(Arc::new(DirNode::new(root_id)));
        let _ = nodes.insert_sync(FUSE_ROOT_ID, root);
        Self {
            remote,
            entries,
            nodes,
            owner,
        }
    }

    /// The uid/gid stamped on every attribute reply.
    #[must_use]
    pub fn owner(&self) -> Owner {
        self.owner
    }

    // --- operations ---

    /// Resolve `name` under the directory `parent`.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn lookup(&self, parent: u64, name: &str) -> Result<(u64, FileAttr), FsError> {
        let dir = self.dir_node(parent)?;
        let entry = self
            .resolve_child(&dir, name)
            .await
            .ok_or(FsError::NotFound)?;
        self.ensure_node(&entry);
        Ok((entry.ino, entry.attr(entry.ino, self.owner)))
    }

    /// List the directory `ino`.
    ///
    /// On a mid-pagination failure the entries gathered so far are returned
    /// together with [`FsError::Cancelled`]; their cache side effects stand.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn readdir(&self, ino: u64) -> (Vec<MetaEntry>, Option<FsError>) {
        let dir = match self.dir_node(ino) {
            Ok(dir) => dir,
            Err(err) => return (Vec::new(), Some(err)),
        };
        let mut listed = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            match self
                .remote
                .list_page(&dir.id, None, page_token.as_deref())
                .await
            {
                Ok(page) => {
                    for file in &page.files {
                        listed.push(self.cache_file(Some(&dir), file));
                    }
                    match page.next_page_token {
                        Some(token) => page_token = Some(token),
                        None => return (listed, None),
                    }
                }
                Err(err) => {
                    error!(id = %dir.id, %err, "listing failed");
                    return (listed, Some(FsError::Cancelled));
                }
            }
        }
    }

    /// Create a folder `name` under `parent`.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn mkdir(&self, parent: u64, name: &str) -> Result<(u64, FileAttr), FsError> {
        let dir = self.dir_node(parent)?;
        if self.resolve_child(&dir, name).await.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let file = self
            .remote
            .create(&dir.id, name, true)
            .await
            .map_err(|err| {
                error!(parent = %dir.id, name, %err, "folder creation failed");
                FsError::RemoteIo
            })?;
        let entry = self.cache_file(Some(&dir), &file);
        self.ensure_node(&entry);
        Ok((entry.ino, entry.attr(entry.ino, self.owner)))
    }

    /// Create an empty file `name` under `parent`.
    ///
    /// The node starts with a zero-length buffer so the writes that follow
    /// a create never download the (empty) remote content first.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn create(&self, parent: u64, name: &str) -> Result<(u64, FileAttr), FsError> {
        let dir = self.dir_node(parent)?;
        if self.resolve_child(&dir, name).await.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let file = self
            .remote
            .create(&dir.id, name, false)
            .await
            .map_err(|err| {
                error!(parent = %dir.id, name, %err, "file creation failed");
                FsError::RemoteIo
            })?;
        let entry = self.cache_file(Some(&dir), &file);
        let node = Node::File(Arc::new(FileNode::new_empty(entry.clone())));
        match self.nodes.entry_sync(entry.ino) {
            Entry::Occupied(mut occupied) => *occupied.get_mut() = node,
            Entry::Vacant(vacant) => {
                vacant.insert_entry(node);
            }
        }
        Ok((entry.ino, entry.attr(entry.ino, self.owner)))
    }

    /// Open never touches the remote; content is downloaded on first read.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn open(&self, ino: u64) -> Result<(), FsError> {
        self.file_node(ino).map(drop)
    }

    /// Attributes for any node.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn getattr(&self, ino: u64) -> Result<FileAttr, FsError> {
        match self.node(ino).ok_or(FsError::NotFound)? {
            Node::Dir(dir) => Ok(match self.entries.get(&dir.id) {
                Some(entry) => entry.attr(ino, self.owner),
                None => synthetic_dir_attr(ino, self.owner),
            }),
            Node::File(file) => {
                let mut state = file.state.lock().await;
                self.ensure_entry(&file, &mut state).await;
                let entry = state.entry.as_ref().ok_or(FsError::NotFound)?;
                Ok(entry.attr(ino, self.owner))
            }
        }
    }

    /// Apply a size change (truncate/extend); other attributes are accepted
    /// and ignored. Directories just report their current attributes.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn setattr(&self, ino: u64, size: Option<u64>) -> Result<FileAttr, FsError> {
        let Node::File(file) = self.node(ino).ok_or(FsError::NotFound)? else {
            return self.getattr(ino).await;
        };
        let mut state = file.state.lock().await;
        if let Some(size) = size {
            self.resize(&file, &mut state, size).await;
            if state.buffer.is_none() {
                return Err(FsError::RemoteIo);
            }
        }
        self.ensure_entry(&file, &mut state).await;
        let entry = state.entry.as_ref().ok_or(FsError::RemoteIo)?;
        Ok(entry.attr(ino, self.owner))
    }

    /// Read up to `size` bytes at `offset`.
    ///
    /// A failed download is reported as [`FsError::NotFound`]: the file is
    /// treated as unreadable rather than broken. The real error is on the
    /// log line from the download attempt.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn read(&self, ino: u64, offset: i64, size: u32) -> Result<Vec<u8>, FsError> {
        let file = self.file_node(ino)?;
        let mut state = file.state.lock().await;
        self.ensure_buffer(&file, &mut state).await;
        let Some(buffer) = state.buffer.as_ref() else {
            return Err(FsError::NotFound);
        };
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        if offset >= buffer.len() {
            return Ok(Vec::new());
        }
        let end = buffer.len().min(offset.saturating_add(size as usize));
        Ok(buffer[offset..end].to_vec())
    }

    /// Write `data` at `offset`, growing or shrinking the buffer to end
    /// exactly at the write. No remote call happens here; flush uploads.
    #[instrument(skip(self, data), fields(trace = %TraceId::new(), len = data.len()))]
    pub async fn write(&self, ino: u64, offset: i64, data: &[u8]) -> Result<u32, FsError> {
        let file = self.file_node(ino)?;
        let mut state = file.state.lock().await;
        let offset = u64::try_from(offset.max(0)).unwrap_or(0);
        self.resize(&file, &mut state, offset).await;
        if state.buffer.is_none() {
            return Err(FsError::RemoteIo);
        }
        if let Some(buffer) = state.buffer.as_mut() {
            buffer.extend_from_slice(data);
        }
        self.update_size(&file, &mut state, offset + data.len() as u64)
            .await;
        Ok(data.len() as u32)
    }

    /// Upload the whole buffer and refresh the metadata from the response.
    ///
    /// Invoked on every descriptor close; with no intervening writes the
    /// re-upload carries identical bytes. When no buffer was ever
    /// materialized there is nothing to upload and flush is a no-op.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn flush(&self, ino: u64) -> Result<(), FsError> {
        let file = self.file_node(ino)?;
        let mut state = file.state.lock().await;
        let Some(buffer) = state.buffer.as_ref() else {
            debug!(id = %file.id, "no content materialized, nothing to flush");
            return Ok(());
        };
        match self.remote.upload(&file.id, buffer).await {
            Ok(updated) => {
                state.entry = Some(self.cache_file(None, &updated));
                Ok(())
            }
            Err(err) => {
                error!(id = %file.id, %err, "upload failed");
                Err(FsError::RemoteIo)
            }
        }
    }

    /// Remove the file `name` from `parent`.
    ///
    /// Drive objects can have several parents; the operation issued removes
    /// this directory from the parent set rather than deleting outright.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn unlink(&self, parent: u64, name: &str) -> Result<(), FsError> {
        let dir = self.dir_node(parent)?;
        let entry = self
            .resolve_child(&dir, name)
            .await
            .ok_or(FsError::NotFound)?;
        if entry.is_dir {
            return Err(FsError::NotSupported);
        }
        self.remove_and_evict(&dir, &entry).await
    }

    /// Remove the empty directory `name` from `parent`.
    ///
    /// Unparenting a non-empty Drive folder would take its contents with
    /// it, so emptiness is verified with a full listing first and anything
    /// found refuses the operation.
    #[instrument(skip(self), fields(trace = %TraceId::new()))]
    pub async fn rmdir(&self, parent: u64, name: &str) -> Result<(), FsError> {
        let dir = self.dir_node(parent)?;
        let entry = self
            .resolve_child(&dir, name)
            .await
            .ok_or(FsError::NotFound)?;
        if !entry.is_dir {
            return Err(FsError::NotSupported);
        }

        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .remote
                .list_page(&entry.id, None, page_token.as_deref())
                .await
                .map_err(|err| {
                    error!(id = %entry.id, %err, "emptiness check failed");
                    FsError::Cancelled
                })?;
            for file in &page.files {
                self.cache_file(None, file);
            }
            if !page.files.is_empty() {
                return Err(FsError::NotSupported);
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        self.remove_and_evict(&dir, &entry).await
    }

    /// The kernel dropped its reference; release the node and any buffer.
    pub fn forget(&self, ino: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        let _ = self.nodes.remove_sync(&ino);
    }

    // --- internals ---

    fn node(&self, ino: u64) -> Option<Node> {
        self.nodes.read_sync(&ino, |_, node| node.clone())
    }

    fn dir_node(&self, ino: u64) -> Result<Arc<DirNode>, FsError> {
        match self.node(ino) {
            Some(Node::Dir(dir)) => Ok(dir),
            Some(Node::File(_)) => Err(FsError::NotSupported),
            None => Err(FsError::NotFound),
        }
    }

    fn file_node(&self, ino: u64) -> Result<Arc<FileNode>, FsError> {
        match self.node(ino) {
            Some(Node::File(file)) => Ok(file),
            Some(Node::Dir(_)) => Err(FsError::NotSupported),
            None => Err(FsError::NotFound),
        }
    }

    /// Per-directory cache first, then a filtered listing. Listing failures
    /// are logged and treated as a miss.
    async fn resolve_child(&self, dir: &DirNode, name: &str) -> Option<MetaEntry> {
        if let Some(entry) = dir.cached_child(name) {
            return Some(entry);
        }
        let mut page_token: Option<String> = None;
        loop {
            match self
                .remote
                .list_page(&dir.id, Some(name), page_token.as_deref())
                .await
            {
                Ok(page) => {
                    if let Some(file) = page.files.first() {
                        return Some(self.cache_file(Some(dir), file));
                    }
                    match page.next_page_token {
                        Some(token) => page_token = Some(token),
                        None => return None,
                    }
                }
                Err(err) => {
                    warn!(parent = %dir.id, name, %err, "child listing failed");
                    return None;
                }
            }
        }
    }

    /// Record a fetched object in the global cache and, when it is a
    /// non-directory child of `dir`, in the per-directory map.
    fn cache_file(&self, dir: Option<&DirNode>, file: &DriveFile) -> MetaEntry {
        let entry = MetaEntry::from_file(file);
        self.entries.insert(entry.id.clone(), entry.clone());
        if let Some(dir) = dir {
            dir.remember_child(&entry);
        }
        entry
    }

    /// Make sure an inode-table node exists for `entry`.
    fn ensure_node(&self, entry: &MetaEntry) {
        if let Entry::Vacant(vacant) = self.nodes.entry_sync(entry.ino) {
            let node = if entry.is_dir {
                Node::Dir(Arc::new(DirNode::new(entry.id.clone())))
            } else {
                Node::File(Arc::new(FileNode::new(entry.id.clone())))
            };
            vacant.insert_entry(node);
        }
    }

    /// Load the file's metadata: global cache first, then a GET by id.
    async fn ensure_entry(&self, file: &FileNode, state: &mut FileState) {
        if state.entry.is_some() {
            return;
        }
        if let Some(entry) = self.entries.get(&file.id) {
            state.entry = Some(entry);
            return;
        }
        match self.remote.get_file(&file.id).await {
            Ok(fetched) => state.entry = Some(self.cache_file(None, &fetched)),
            Err(err) => warn!(id = %file.id, %err, "metadata fetch failed"),
        }
    }

    /// Materialize the buffer, downloading the full content on first use.
    /// On failure the buffer stays absent and the caller picks the errno.
    async fn ensure_buffer(&self, file: &FileNode, state: &mut FileState) {
        if state.buffer.is_some() {
            return;
        }
        match self.remote.download(&file.id).await {
            Ok(content) => state.buffer = Some(content),
            Err(err) => error!(id = %file.id, %err, "download failed"),
        }
    }

    /// Bring the buffer to exactly `size` bytes: truncating, zero-filling,
    /// or (for zero) replacing without a download.
    async fn resize(&self, file: &FileNode, state: &mut FileState, size: u64) {
        if size == 0 {
            state.buffer = Some(Vec::new());
        } else {
            self.ensure_buffer(file, state).await;
            let Some(buffer) = state.buffer.as_mut() else {
                return;
            };
            buffer.resize(usize::try_from(size).unwrap_or(usize::MAX), 0);
        }
        self.update_size(file, state, size).await;
    }

    /// Record the new size on the node's entry and write it through to the
    /// global cache so attribute paths on other handles observe it.
    async fn update_size(&self, file: &FileNode, state: &mut FileState, size: u64) {
        self.ensure_entry(file, state).await;
        if let Some(entry) = state.entry.as_mut() {
            entry.size = size;
            self.entries.insert(entry.id.clone(), entry.clone());
        }
    }

    /// Issue the parent-set removal and drop the name from both cache tiers.
    async fn remove_and_evict(&self, dir: &DirNode, entry: &MetaEntry) -> Result<(), FsError> {
        self.remote
            .remove_parent(&entry.id, &dir.id)
            .await
            .map_err(|err| {
                error!(id = %entry.id, parent = %dir.id, %err, "removal failed");
                FsError::RemoteIo
            })?;
        dir.forget_child(&entry.name);
        self.entries.remove(&entry.id);
        Ok(())
    }
}
