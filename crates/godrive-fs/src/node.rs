//! Directory and file nodes.
//!
//! The kernel's inode table holds these by number; nothing owns its children
//! as pointers. A directory owns its name cache, a file owns its content
//! state, and everything else (metadata fetches, buffer loads) goes through
//! the core with the remote handle.

use std::sync::Arc;

use scc::hash_map::Entry;
use tokio::sync::Mutex;

use crate::entry::MetaEntry;
use crate::inode::ino_for_id;

/// A directory inode.
pub struct DirNode {
    /// The Drive object id this directory maps to.
    pub id: String,
    /// Inode number derived from the id.
    pub ino: u64,
    /// Name → metadata for known non-directory children.
    ///
    /// Directory children are deliberately not memoized here: directories
    /// are re-resolved on lookup so traversals stay cheap and the map never
    /// grows a second level.
    children: scc::HashMap<String, MetaEntry>,
}

impl DirNode {
    #[must_use]
    pub fn new(id: String) -> Self {
        let ino = ino_for_id(&id);
        Self {
            id,
            ino,
            children: scc::HashMap::new(),
        }
    }

    /// The cached metadata for `name`, if any.
    #[must_use]
    pub fn cached_child(&self, name: &str) -> Option<MetaEntry> {
        self.children.read_sync(name, |_, entry| entry.clone())
    }

    /// Memoize a child entry. Directory entries are ignored.
    pub fn remember_child(&self, entry: &MetaEntry) {
        if entry.is_dir {
            return;
        }
        match self.children.entry_sync(entry.name.clone()) {
            Entry::Occupied(mut occupied) => {
                *occupied.get_mut() = entry.clone();
            }
            Entry::Vacant(vacant) => {
                vacant.insert_entry(entry.clone());
            }
        }
    }

    /// Drop `name` from the memoized children.
    pub fn forget_child(&self, name: &str) {
        let _ = self.children.remove_sync(name);
    }
}

/// Mutable per-file state, guarded by the node's lock.
#[derive(Default)]
pub struct FileState {
    /// Lazily-loaded metadata. `size` is kept equal to the buffer length
    /// whenever the buffer is populated.
    pub entry: Option<MetaEntry>,
    /// The full file content, materialized on first read, write or
    /// truncate, and re-uploaded whole on flush.
    pub buffer: Option<Vec<u8>>,
}

/// A regular-file inode.
pub struct FileNode {
    /// The Drive object id this file maps to.
    pub id: String,
    /// Inode number derived from the id.
    pub ino: u64,
    /// Content and size state. The mutex serializes every content and size
    /// operation on this inode; operations on distinct inodes run in
    /// parallel.
    pub state: Mutex<FileState>,
}

impl FileNode {
    #[must_use]
    pub fn new(id: String) -> Self {
        let ino = ino_for_id(&id);
        Self {
            id,
            ino,
            state: Mutex::new(FileState::default()),
        }
    }

    /// A node for a just-created file: metadata known, content empty, so
    /// the first write does not trigger a pointless download.
    #[must_use]
    pub fn new_empty(entry: MetaEntry) -> Self {
        let (id, ino) = (entry.id.clone(), entry.ino);
        Self {
            id,
            ino,
            state: Mutex::new(FileState {
                entry: Some(entry),
                buffer: Some(Vec::new()),
            }),
        }
    }
}

/// A node handle as stored in the inode table.
#[derive(Clone)]
pub enum Node {
    Dir(Arc<DirNode>),
    File(Arc<FileNode>),
}

impl Node {
    /// The Drive object id behind this node.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Node::Dir(dir) => &dir.id,
            Node::File(file) => &file.id,
        }
    }
}
