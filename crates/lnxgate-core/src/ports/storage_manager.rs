//! Storage manager port (driven/secondary port)
//!
//! This module defines the interface to the out-of-process storage manager,
//! the daemon that owns the remote object store connection and the local
//! page cache. Every filesystem mutation the VFS performs goes through this
//! port; the VFS never talks to the object store itself.
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` for async trait methods.
//! - Errors are a typed [`StorageError`] rather than `anyhow` because the
//!   kernel driver needs errno fidelity end to end; the VFS maps these onto
//!   POSIX codes without guessing.
//! - Completion payloads are owned by the storage manager and transferred to
//!   the caller (listings, cache paths, link targets).

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::attr::{DirListing, RemoteAttr};

/// Errors reported by the storage manager.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The named entry or inode does not exist remotely.
    #[error("entry not found")]
    NotFound,

    /// A path component expected to be a directory is not.
    #[error("not a directory")]
    NotADirectory,

    /// The target is a directory where a file was required.
    #[error("is a directory")]
    IsADirectory,

    /// Entry name exceeds the store's `name_max`.
    #[error("name too long")]
    NameTooLong,

    /// rmdir / rename target directory is not empty.
    #[error("directory not empty")]
    NotEmpty,

    /// Local I/O failure inside the storage manager (page cache, socket).
    #[error("storage manager I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure, carried as a raw errno value.
    #[error("storage manager failure (errno {0})")]
    Errno(i32),
}

impl StorageError {
    /// POSIX errno equivalent of this error.
    pub fn errno(&self) -> libc::c_int {
        match self {
            StorageError::NotFound => libc::ENOENT,
            StorageError::NotADirectory => libc::ENOTDIR,
            StorageError::IsADirectory => libc::EISDIR,
            StorageError::NameTooLong => libc::ENAMETOOLONG,
            StorageError::NotEmpty => libc::ENOTEMPTY,
            StorageError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            StorageError::Errno(errno) => *errno,
        }
    }
}

/// Result alias for storage manager operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of a rename reported by the storage manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenameOutcome {
    /// Inode number of the object that was renamed.
    pub renamed: u64,
    /// Inode number of a pre-existing target entry that the rename
    /// replaced, when there was one.
    pub deleted: Option<u64>,
}

/// Asynchronous function-level interface to the storage manager.
///
/// Each method corresponds to one RPC; the storage manager applies its own
/// retry policy, the VFS never retries. `open` and `create_and_open`
/// materialize the object in the local page cache and hand back the path of
/// the cached copy; the VFS owns the file descriptor it opens on that path.
#[async_trait::async_trait]
pub trait IStorageManager: Send + Sync {
    /// Resolves `name` inside the directory `parent_ino`.
    async fn lookup_child(&self, parent_ino: u64, name: &str) -> StorageResult<RemoteAttr>;

    /// Fetches the current stat of `ino`.
    async fn getattr(&self, ino: u64) -> StorageResult<RemoteAttr>;

    /// Reads the complete listing of the directory `ino`.
    async fn readdir(&self, ino: u64) -> StorageResult<DirListing>;

    /// Prepares `ino` for I/O and returns the local page-cache path.
    async fn open(&self, ino: u64, flags: i32) -> StorageResult<PathBuf>;

    /// Creates `name` under `parent_ino` and opens it in one round trip.
    /// Returns the new object's stat and its local page-cache path.
    async fn create_and_open(
        &self,
        parent_ino: u64,
        name: &str,
        uid: u32,
        gid: u32,
        mode: u32,
        flags: i32,
    ) -> StorageResult<(RemoteAttr, PathBuf)>;

    /// Signals that the last open descriptor on `ino` was closed. `dirty`
    /// tells the storage manager whether the cached copy was written to.
    async fn release(&self, ino: u64, dirty: bool) -> StorageResult<()>;

    /// Pushes attribute changes remotely. `size_changed` is set when the
    /// request included a truncate so the manager can invalidate transfers.
    async fn setattr(&self, ino: u64, attr: &RemoteAttr, size_changed: bool) -> StorageResult<()>;

    /// Creates a directory. Returns its stat.
    async fn mkdir(
        &self,
        parent_ino: u64,
        name: &str,
        uid: u32,
        gid: u32,
        mode: u32,
    ) -> StorageResult<RemoteAttr>;

    /// Removes an empty directory. Returns the deleted inode number.
    async fn rmdir(&self, parent_ino: u64, name: &str) -> StorageResult<u64>;

    /// Removes a file or symlink entry. Returns the unlinked inode number.
    async fn unlink(&self, parent_ino: u64, name: &str) -> StorageResult<u64>;

    /// Renames an entry, possibly across directories, replacing any
    /// existing target permitted by POSIX.
    async fn rename(
        &self,
        old_parent_ino: u64,
        old_name: &str,
        new_parent_ino: u64,
        new_name: &str,
    ) -> StorageResult<RenameOutcome>;

    /// Adds a hard link to `ino` at `new_parent_ino`/`new_name`. Returns
    /// the target's refreshed stat.
    async fn hardlink(&self, ino: u64, new_parent_ino: u64, new_name: &str)
        -> StorageResult<RemoteAttr>;

    /// Creates a symlink pointing at `target`. Returns the new link's stat.
    async fn symlink(
        &self,
        target: &str,
        new_parent_ino: u64,
        new_name: &str,
        uid: u32,
        gid: u32,
    ) -> StorageResult<RemoteAttr>;

    /// Reads the target path of a symlink.
    async fn readlink(&self, ino: u64) -> StorageResult<String>;

    /// Informs the storage manager that the local cached copy of `ino` has
    /// been written to and will need uploading.
    async fn notify_write(&self, ino: u64) -> StorageResult<()>;

    /// Filesystem block size advertised through statfs.
    fn block_size(&self) -> u32;

    /// Maximum entry name length in bytes.
    fn name_max(&self) -> u32;
}
