// Allow unsafe for libc::getuid()/getgid() calls required by FUSE file attributes
#![allow(unsafe_code)]
// These lints are intentionally allowed for the FUSE adapter:
// - Casts: necessary for FUSE API compatibility (offset/size conversions)
// - Function length: callback signatures are dictated by the fuser trait
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::too_many_lines,
    clippy::needless_pass_by_value
)]

//! FUSE filesystem interface for tablefs.
//!
//! Projects a relational database onto a mountpoint: every table becomes a
//! directory under the root, every row a regular file of `key=value` lines.
//! Rewriting a row file issues a primary-key-qualified UPDATE against the
//! originating row.
//!
//! ```text
//! ./mnt/sqlitefs/              (mountpoint)
//! ├── emp/                     (table)
//! │   ├── 1                    (row:  id=1\nname=alice)
//! │   └── 2
//! └── dept/
//!     └── 1
//! ```
//!
//! The projection is row-level only: no creation or deletion of rows, no
//! schema changes, no renames. A directory's children are enumerated from
//! the database once, on first open, and stay fixed for the mount's
//! lifetime.

pub mod tree;

use crate::error::{Error, Result};
use crate::store::Gateway;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tree::{EntryKind, NodeAttr, NodeTree, ROOT_INO};

/// Time-to-live for cached attributes and directory entries.
const TTL: Duration = Duration::from_secs(1);

/// FUSE filesystem exposing one database.
pub struct TableFs {
    /// The inode tree all callbacks are translated onto. The transport
    /// delivers callbacks serially, which totally orders tree mutations.
    tree: NodeTree,
}

impl TableFs {
    /// Creates a filesystem over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            tree: NodeTree::new(gateway),
        }
    }

    /// Marshals node attributes into the FUSE wire structure.
    fn file_attr(attr: &NodeAttr) -> FileAttr {
        let (kind, nlink) = match attr.kind {
            EntryKind::Directory => (FileType::Directory, 2),
            EntryKind::File => (FileType::RegularFile, 1),
        };
        FileAttr {
            ino: attr.ino,
            size: attr.size,
            blocks: attr.size.div_ceil(512),
            atime: attr.mtime,
            mtime: attr.mtime,
            ctime: attr.mtime,
            crtime: attr.mtime,
            kind,
            perm: attr.perm,
            nlink,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }
}

impl Filesystem for TableFs {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOENT);
            return;
        };
        tracing::debug!("lookup parent={parent} name={name}");
        match self.tree.lookup(parent, name) {
            Ok(attr) => reply.entry(&TTL, &Self::file_attr(&attr), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.tree.getattr(ino) {
            Ok(attr) => reply.attr(&TTL, &Self::file_attr(&attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let attr = match self.tree.getattr(ino) {
            Ok(attr) => attr,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };
        match size {
            // Editors truncate before rewriting the whole file. The old
            // payload must survive until the write arrives, because only
            // it can identify the row to update; report the requested
            // size but keep the bytes.
            Some(0) if attr.kind == EntryKind::File => {
                let mut out = Self::file_attr(&attr);
                out.size = 0;
                reply.attr(&TTL, &out);
            }
            Some(n) if n != attr.size => reply.error(libc::EPERM),
            _ => reply.attr(&TTL, &Self::file_attr(&attr)),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        tracing::debug!("opendir ino={ino}");
        match self.tree.open_dir(ino) {
            Ok(_) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let children = match self.tree.open_dir(ino) {
            Ok(children) => children,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ROOT_INO, FileType::Directory, "..".to_string()),
        ];
        for child in children {
            let kind = match child.kind {
                EntryKind::Directory => FileType::Directory,
                EntryKind::File => FileType::RegularFile,
            };
            entries.push((child.ino, kind, child.name));
        }

        for (i, (child_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.tree.open_file(ino) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.tree.read(ino, offset, size) {
            Ok(data) => reply.data(data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        tracing::debug!("write ino={ino} offset={offset} len={}", data.len());
        match self.tree.write(ino, offset, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                tracing::warn!("write failed: {e}");
                reply.error(e.errno());
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        reply.error(libc::EPERM);
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        _parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        reply.error(libc::EPERM);
    }

    fn unlink(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::EPERM);
    }

    fn rmdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.error(libc::EPERM);
    }

    fn rename(
        &mut self,
        _req: &Request,
        _parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        reply.error(libc::EPERM);
    }
}

/// Mounts the filesystem and serves until unmount.
///
/// # Errors
///
/// Returns an error if the FUSE session cannot be established.
pub fn mount(gateway: Arc<dyn Gateway>, mountpoint: &Path) -> Result<()> {
    let fs = TableFs::new(gateway);
    let options = vec![
        MountOption::FSName("tablefs".to_string()),
        MountOption::AutoUnmount,
    ];

    tracing::info!("mounting at {}", mountpoint.display());
    fuser::mount2(fs, mountpoint, &options).map_err(|e| Error::Config {
        message: format!("failed to mount filesystem: {e}"),
    })?;
    tracing::info!("unmounted {}", mountpoint.display());
    Ok(())
}
