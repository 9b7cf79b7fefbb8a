#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gdrive::{DriveError, DriveFile, FileList, FOLDER_MIME_TYPE};

use godrive_fs::entry::Owner;
use godrive_fs::fs::{EntryCache, FsCore, ENTRY_CACHE_CAPACITY};
use godrive_fs::remote::Remote;

const FILE_MIME: &str = "application/octet-stream";

#[derive(Clone)]
struct MockFile {
    id: String,
    name: String,
    is_dir: bool,
}

#[derive(Default)]
struct DriveState {
    /// id → object record.
    files: HashMap<String, MockFile>,
    /// parent id → ordered child ids.
    children: HashMap<String, Vec<String>>,
    /// id → content bytes (files only).
    contents: HashMap<String, Vec<u8>>,
}

/// An in-memory Drive with call counters and error injection.
pub struct MockDrive {
    state: Mutex<DriveState>,
    /// Children per page; small values force pagination in tests.
    pub page_size: AtomicUsize,
    /// Counts every `list_page` call.
    pub list_calls: AtomicU64,
    /// Counts every content download.
    pub download_calls: AtomicU64,
    /// Counts every metadata get.
    pub get_calls: AtomicU64,
    /// Recorded uploads as `(id, bytes)`, in order.
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    /// When >= 0: the number of list pages still served before every
    /// subsequent `list_page` fails. -1 disables injection.
    pub list_pages_before_failure: AtomicI64,
    /// When true, every download fails.
    pub fail_downloads: std::sync::atomic::AtomicBool,
    /// Ids handed out by `create`.
    next_id: AtomicU64,
}

impl MockDrive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DriveState::default()),
            page_size: AtomicUsize::new(50),
            list_calls: AtomicU64::new(0),
            download_calls: AtomicU64::new(0),
            get_calls: AtomicU64::new(0),
            uploads: Mutex::new(Vec::new()),
            list_pages_before_failure: AtomicI64::new(-1),
            fail_downloads: std::sync::atomic::AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn add_dir(&self, parent: &str, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            id.to_owned(),
            MockFile {
                id: id.to_owned(),
                name: name.to_owned(),
                is_dir: true,
            },
        );
        state
            .children
            .entry(parent.to_owned())
            .or_default()
            .push(id.to_owned());
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            id.to_owned(),
            MockFile {
                id: id.to_owned(),
                name: name.to_owned(),
                is_dir: false,
            },
        );
        state.contents.insert(id.to_owned(), content.to_vec());
        state
            .children
            .entry(parent.to_owned())
            .or_default()
            .push(id.to_owned());
    }

    /// Remote content for `id`, for post-flush assertions.
    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().contents.get(id).cloned()
    }

    pub fn list_count(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> u64 {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn wire_file(state: &DriveState, file: &MockFile) -> DriveFile {
        let size = state.contents.get(&file.id).map(|c| c.len() as i64);
        DriveFile {
            id: file.id.clone(),
            name: file.name.clone(),
            mime_type: if file.is_dir {
                FOLDER_MIME_TYPE.to_owned()
            } else {
                FILE_MIME.to_owned()
            },
            size,
            created_time: Some("2024-01-02T03:04:05Z".to_owned()),
            modified_time: Some("2024-01-02T03:04:06Z".to_owned()),
        }
    }

    fn remote_failure() -> DriveError {
        DriveError::Api {
            status: http::StatusCode::INTERNAL_SERVER_ERROR,
            message: "injected failure".to_owned(),
        }
    }
}

impl Remote for MockDrive {
    async fn list_page(
        &self,
        parent_id: &str,
        name: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.list_pages_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(Self::remote_failure());
        }
        if remaining > 0 {
            self.list_pages_before_failure
                .fetch_sub(1, Ordering::SeqCst);
        }

        let state = self.state.lock().unwrap();
        let mut matches: Vec<&MockFile> = state
            .children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| state.files.get(id))
            .filter(|f| name.is_none_or(|n| f.name == n))
            .collect();
        // orderBy=folder,name
        matches.sort_by_key(|f| (!f.is_dir, f.name.clone()));

        let offset: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let page_size = self.page_size.load(Ordering::SeqCst);
        let page: Vec<DriveFile> = matches
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|f| Self::wire_file(&state, f))
            .collect();
        let next = offset + page.len();
        Ok(FileList {
            files: page,
            next_page_token: (next < matches.len()).then(|| next.to_string()),
        })
    }

    async fn get_file(&self, id: &str) -> Result<DriveFile, DriveError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .files
            .get(id)
            .map(|f| Self::wire_file(&state, f))
            .ok_or(DriveError::NotFound)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>, DriveError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(Self::remote_failure());
        }
        let state = self.state.lock().unwrap();
        state
            .contents
            .get(id)
            .cloned()
            .ok_or(DriveError::NotFound)
    }

    async fn upload(&self, id: &str, content: &[u8]) -> Result<DriveFile, DriveError> {
        self.uploads
            .lock()
            .unwrap()
            .push((id.to_owned(), content.to_vec()));
        let mut state = self.state.lock().unwrap();
        if !state.files.contains_key(id) {
            return Err(DriveError::NotFound);
        }
        state.contents.insert(id.to_owned(), content.to_vec());
        let file = state.files.get(id).unwrap().clone();
        Ok(Self::wire_file(&state, &file))
    }

    async fn create(
        &self,
        parent_id: &str,
        name: &str,
        is_dir: bool,
    ) -> Result<DriveFile, DriveError> {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            id.clone(),
            MockFile {
                id: id.clone(),
                name: name.to_owned(),
                is_dir,
            },
        );
        if !is_dir {
            state.contents.insert(id.clone(), Vec::new());
        }
        state
            .children
            .entry(parent_id.to_owned())
            .or_default()
            .push(id.clone());
        let file = state.files.get(&id).unwrap().clone();
        Ok(Self::wire_file(&state, &file))
    }

    async fn remove_parent(&self, id: &str, parent_id: &str) -> Result<(), DriveError> {
        let mut state = self.state.lock().unwrap();
        match state.children.get_mut(parent_id) {
            Some(siblings) => {
                siblings.retain(|c| c != id);
                Ok(())
            }
            None => Err(DriveError::NotFound),
        }
    }
}

/// A core over `drive`, rooted at `root_id`, with its own entry cache.
pub fn new_core(drive: &Arc<MockDrive>, root_id: &str) -> FsCore<MockDrive> {
    let entries: Arc<EntryCache> = Arc::new(EntryCache::new(ENTRY_CACHE_CAPACITY));
    FsCore::new(
        Arc::clone(drive),
        entries,
        root_id.to_owned(),
        Owner { uid: 1000, gid: 1000 },
    )
}
