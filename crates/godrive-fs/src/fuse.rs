//! The fuser adapter.
//!
//! The kernel expects synchronous replies; the core is async because every
//! remote call is. Each callback bridges onto the shared tokio runtime with
//! `block_on`, so a slow Drive call stalls only the kernel thread that
//! issued the request. The HTTP client timeout bounds every such stall.

use std::ffi::OsStr;
use std::time::Duration;

use fuser::{
    Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyWrite, Request,
};
use tokio::runtime::Handle;

use crate::fs::{FsCore, FsError};
use crate::remote::Remote;

/// How long the kernel may cache entries and attributes.
const KERNEL_TTL: Duration = Duration::from_secs(1);

/// A mounted filesystem: one core plus the runtime bridge.
pub struct DriveFuse<R: Remote> {
    core: FsCore<R>,
    handle: Handle,
}

impl<R: Remote> DriveFuse<R> {
    #[must_use]
    pub fn new(core: FsCore<R>, handle: Handle) -> Self {
        Self { core, handle }
    }
}

/// Names arrive as `OsStr`; Drive names are unicode, so anything else
/// cannot exist remotely.
fn utf8_name(name: &OsStr) -> Result<&str, FsError> {
    name.to_str().ok_or(FsError::NotFound)
}

impl<R: Remote> Filesystem for DriveFuse<R> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => return reply.error(err.errno()),
        };
        match self.handle.block_on(self.core.lookup(parent, name)) {
            Ok((_, attr)) => reply.entry(&KERNEL_TTL, &attr, 0),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, _nlookup: u64) {
        self.core.forget(ino);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.handle.block_on(self.core.getattr(ino)) {
            Ok(attr) => reply.attr(&KERNEL_TTL, &attr),
            Err(err) => reply.error(err.errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.handle.block_on(self.core.setattr(ino, size)) {
            Ok(attr) => reply.attr(&KERNEL_TTL, &attr),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        match self.handle.block_on(self.core.open(ino)) {
            // The node itself is the handle; its ino is the stable token.
            Ok(()) => reply.opened(ino, flags as u32),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.handle.block_on(self.core.read(ino, offset, size)) {
            Ok(data) => reply.data(&data),
            Err(err) => reply.error(err.errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.handle.block_on(self.core.write(ino, offset, data)) {
            Ok(written) => reply.written(written),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        match self.handle.block_on(self.core.flush(ino)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => return reply.error(err.errno()),
        };
        match self.handle.block_on(self.core.create(parent, name)) {
            Ok((ino, attr)) => reply.created(&KERNEL_TTL, &attr, 0, ino, flags as u32),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => return reply.error(err.errno()),
        };
        match self.handle.block_on(self.core.mkdir(parent, name)) {
            Ok((_, attr)) => reply.entry(&KERNEL_TTL, &attr, 0),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => return reply.error(err.errno()),
        };
        match self.handle.block_on(self.core.unlink(parent, name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let name = match utf8_name(name) {
            Ok(name) => name,
            Err(err) => return reply.error(err.errno()),
        };
        match self.handle.block_on(self.core.rmdir(parent, name)) {
            Ok(()) => reply.ok(),
            Err(err) => reply.error(err.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let (entries, err) = self.handle.block_on(self.core.readdir(ino));
        if let Some(err) = err {
            // The kernel protocol cannot carry both entries and an errno;
            // the cache side effects of the partial listing stand.
            return reply.error(err.errno());
        }

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let mut index = 0usize;

        // `.` and `..` first. Parent inode numbers are not tracked (a Drive
        // object can have several parents), so `..` reports this directory.
        for name in [".", ".."] {
            if index >= offset
                && reply.add(ino, (index + 1) as i64, fuser::FileType::Directory, name)
            {
                return reply.ok();
            }
            index += 1;
        }

        for entry in &entries {
            if index >= offset
                && reply.add(entry.ino, (index + 1) as i64, entry.kind(), &entry.name)
            {
                return reply.ok();
            }
            index += 1;
        }

        reply.ok();
    }
}
