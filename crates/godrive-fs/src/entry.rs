//! Cached metadata for one Drive object.

use std::time::SystemTime;

use fuser::{FileAttr, FileType};
use gdrive::DriveFile;
use tracing::warn;

use crate::inode::ino_for_id;

/// The uid/gid every attribute reply reports: the mounting process's own.
#[derive(Debug, Clone, Copy)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Capture the current process's ids.
    #[must_use]
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }
}

/// One cached metadata record.
///
/// A value type: both cache tiers store copies, and a `FileNode` keeps its
/// own under the content lock, so size updates never race a reader holding
/// a stale pointer.
#[derive(Debug, Clone)]
pub struct MetaEntry {
    pub name: String,
    pub id: String,
    pub is_dir: bool,
    pub cached_at: SystemTime,
    pub ino: u64,
    pub size: u64,
    pub ctime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

impl MetaEntry {
    /// Build an entry from the wire model.
    #[must_use]
    pub fn from_file(file: &DriveFile) -> Self {
        Self {
            name: file.name.clone(),
            id: file.id.clone(),
            is_dir: file.is_folder(),
            cached_at: SystemTime::now(),
            ino: ino_for_id(&file.id),
            size: file.size.unwrap_or(0).max(0) as u64,
            ctime: file.created_time.as_deref().map(parse_time),
            mtime: file.modified_time.as_deref().map(parse_time),
        }
    }

    /// The kernel file type for this entry.
    #[must_use]
    pub fn kind(&self) -> FileType {
        if self.is_dir {
            FileType::Directory
        } else {
            FileType::RegularFile
        }
    }

    /// Fill kernel attributes. `ino` may be overridden so the mount root can
    /// answer under `FUSE_ROOT_ID`.
    #[must_use]
    pub fn attr(&self, ino: u64, owner: Owner) -> FileAttr {
        let mtime = self.mtime.unwrap_or(SystemTime::UNIX_EPOCH);
        let ctime = self.ctime.unwrap_or(SystemTime::UNIX_EPOCH);
        let (kind, perm) = if self.is_dir {
            (FileType::Directory, 0o755)
        } else {
            (FileType::RegularFile, 0o644)
        };
        FileAttr {
            ino,
            size: self.size,
            blocks: self.size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime,
            crtime: ctime,
            kind,
            perm,
            nlink: if self.is_dir { 2 } else { 1 },
            uid: owner.uid,
            gid: owner.gid,
            rdev: 0,
            blksize: 4096,
            flags: 0,
        }
    }
}

/// Attributes for a directory whose metadata has not been fetched.
///
/// The mount root is served this way until something populates the global
/// cache for it; matches what the kernel would otherwise see as zeroed
/// attributes, but with sane mode and ownership.
#[must_use]
pub fn synthetic_dir_attr(ino: u64, owner: Owner) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino,
        size: 0,
        blocks: 0,
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::Directory,
        perm: 0o755,
        nlink: 2,
        uid: owner.uid,
        gid: owner.gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

/// Parse an RFC 3339 timestamp, substituting the current wall clock when the
/// remote hands back something unparseable.
fn parse_time(raw: &str) -> SystemTime {
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.into(),
        Err(err) => {
            warn!(time = raw, %err, "unable to parse time");
            SystemTime::now()
        }
    }
}
