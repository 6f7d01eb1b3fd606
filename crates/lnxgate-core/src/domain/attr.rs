//! Attribute and directory-listing DTOs exchanged with the storage manager.
//!
//! These are port-level DTOs, not kernel-facing structures; the VFS crate is
//! responsible for mapping them to the FUSE attribute types it hands to the
//! kernel driver.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Kind of a filesystem object, as far as the gateway distinguishes them.
///
/// The object store has no notion of devices, sockets or pipes; the storage
/// manager only ever reports these three kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file backed by a remote object.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

/// Stat data for one filesystem object, as reported by the storage manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttr {
    /// Inode number, unique within the gateway instance. Always > 0.
    pub ino: u64,
    /// Object kind.
    pub kind: NodeKind,
    /// Unix permission bits (e.g. 0o644).
    pub perm: u16,
    /// Number of hard links.
    pub nlink: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last metadata change time.
    pub ctime: SystemTime,
}

impl RemoteAttr {
    /// Checks the invariants the VFS relies on before admitting the stat
    /// into the inode cache.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.ino == 0 {
            return Err(DomainError::InvalidInodeNumber(self.ino));
        }

        Ok(())
    }

    /// Returns true if this object is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDirEntry {
    /// Entry name within the directory. Never empty, never "." or "..".
    pub name: String,
    /// Stat of the child object.
    pub attr: RemoteAttr,
}

/// Complete directory listing returned by the storage manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirListing {
    /// Entries in the order the storage manager produced them.
    pub entries: Vec<RemoteDirEntry>,
    /// When set, the listing is large enough that the storage manager
    /// recommends building a name index for child lookups.
    pub use_dir_index: bool,
}

/// A setattr request, decoded from the kernel's stat-mask bitfield.
///
/// `None`/`false` fields were not present in the mask. An all-empty request
/// is a no-op the dispatcher answers without any storage manager traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetAttrRequest {
    /// New permission bits.
    pub mode: Option<u32>,
    /// New file size (truncate or extend).
    pub size: Option<u64>,
    /// Explicit access time.
    pub atime: Option<SystemTime>,
    /// Explicit modification time.
    pub mtime: Option<SystemTime>,
    /// Set the access time to "now" at application time.
    pub atime_now: bool,
    /// Set the modification time to "now" at application time.
    pub mtime_now: bool,
}

impl SetAttrRequest {
    /// True when no recognised bit was set in the kernel's mask.
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.size.is_none()
            && self.atime.is_none()
            && self.mtime.is_none()
            && !self.atime_now
            && !self.mtime_now
    }
}

/// Synthesized filesystem statistics answered to statfs.
///
/// The object store has no meaningful block or inode accounting, so every
/// count is a large sentinel; only `block_size` and `name_max` carry real
/// configuration from the storage manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub files_available: u64,
    pub name_max: u32,
}
