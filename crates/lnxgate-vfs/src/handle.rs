//! Per-open state: directory snapshots and local cached-file handles.
//!
//! A directory open produces a read-only snapshot of the listing the
//! storage manager returned. A file open produces a handle owning a
//! descriptor on the local page-cache copy of the object; the storage
//! manager materializes that copy and hands back its path.

use std::{
    collections::HashMap,
    fs::{File, FileTimes, OpenOptions, Permissions},
    io,
    os::unix::{
        fs::PermissionsExt,
        io::{AsRawFd, RawFd},
    },
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::SystemTime,
};

use fuser::FileAttr;
use lnxgate_core::domain::SetAttrRequest;

use crate::{error::VfsError, inode::Inode};

/// True when `flags` carries one of the three valid POSIX access modes.
pub(crate) fn flags_valid(flags: i32) -> bool {
    matches!(
        flags & libc::O_ACCMODE,
        libc::O_RDONLY | libc::O_WRONLY | libc::O_RDWR
    )
}

/// True when `flags` opens for writing.
pub(crate) fn writable_flags(flags: i32) -> bool {
    (flags & libc::O_ACCMODE) != libc::O_RDONLY
}

/// One entry of a directory snapshot.
///
/// Holds a strong reference to the child inode so the whole listing stays
/// resolvable for the snapshot's lifetime.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name within the directory.
    pub name: String,
    /// The child object.
    pub inode: Arc<Inode>,
}

/// Read-only snapshot of a directory listing.
///
/// Entries keep the order the storage manager produced. When the manager
/// recommends it (`use_dir_index`), an auxiliary name -> ino map is built so
/// child lookups can skip the linear scan; small listings go without.
#[derive(Debug)]
pub struct DirHandle {
    entries: Vec<DirEntry>,
    index: Option<HashMap<String, u64>>,
}

impl DirHandle {
    /// Builds a snapshot from resolved entries.
    pub fn new(entries: Vec<DirEntry>, use_dir_index: bool) -> Self {
        let index = use_dir_index.then(|| {
            entries
                .iter()
                .map(|e| (e.name.clone(), e.inode.ino().get()))
                .collect()
        });

        Self { entries, index }
    }

    /// Number of entries in the snapshot.
    pub fn entries_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry at `idx`: its name and the child's current attributes.
    pub fn entry(&self, idx: usize) -> Option<(&str, FileAttr)> {
        self.entries
            .get(idx)
            .map(|e| (e.name.as_str(), e.inode.attr()))
    }

    /// Child inode number by name, answered from the auxiliary index.
    /// Snapshots built without an index always miss.
    pub fn child_ino(&self, name: &str) -> Option<u64> {
        self.index.as_ref()?.get(name).copied()
    }

    /// Entries left at and after position `pos`.
    pub fn remaining(&self, pos: usize) -> usize {
        self.entries.len().saturating_sub(pos)
    }

    /// Total name bytes of the entries at and after `pos`, counted until
    /// the running total reaches `max_size`. Used by the kernel bridge to
    /// size readdir reply buffers.
    pub fn remaining_name_len(&self, pos: usize, max_size: usize) -> usize {
        let mut total = 0;
        for entry in self.entries.iter().skip(pos) {
            if total >= max_size {
                break;
            }
            total += entry.name.len();
        }
        total
    }

    /// True when the auxiliary name index was built.
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }
}

/// Handle on the local page-cache copy of an open file.
///
/// Owns the descriptor exclusively; no two handles share a descriptor. The
/// dirty flag records that at least one write reached the cached copy since
/// the open, which the storage manager learns about on release.
#[derive(Debug)]
pub struct FileHandle {
    inode: Arc<Inode>,
    file: File,
    writable: bool,
    dirty: AtomicBool,
}

impl FileHandle {
    /// The inode this handle was opened on.
    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    /// Inode number shortcut.
    pub fn ino(&self) -> u64 {
        self.inode.ino().get()
    }

    /// The cached file, for reading.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Raw descriptor, for AIO submission.
    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// The cached file, for writing. Fails with `EBADF` when the handle
    /// was opened read-only, like a write on a read-only descriptor would.
    pub fn write_file(&self) -> Result<&File, VfsError> {
        if !self.writable {
            return Err(VfsError::Io(io::Error::from_raw_os_error(libc::EBADF)));
        }
        Ok(&self.file)
    }

    /// True when the handle was opened for writing.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Records that the cached copy received a write.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Whether the cached copy was written through this handle.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Restats the cached file and writes size and mtime back into the
    /// inode, keeping kernel-visible attributes in step with local writes.
    pub fn refresh_inode_from_fd(&self) -> io::Result<()> {
        let metadata = self.file.metadata()?;
        let mtime = metadata.modified()?;
        self.inode.refresh_local(metadata.len(), mtime);
        Ok(())
    }

    /// Applies a setattr request to the cached file: chmod, truncate and
    /// timestamp updates. All requested changes are attempted; the first
    /// failure is reported.
    pub fn apply_setattr(&self, req: &SetAttrRequest, now: SystemTime) -> io::Result<()> {
        let mut result = Ok(());

        if let Some(mode) = req.mode {
            let res = self.file.set_permissions(Permissions::from_mode(mode));
            if result.is_ok() {
                result = res;
            }
        }

        if let Some(size) = req.size {
            let res = self.file.set_len(size);
            if result.is_ok() {
                result = res;
            }
        }

        let mut times = FileTimes::new();
        let mut have_times = false;
        if let Some(atime) = req.atime {
            times = times.set_accessed(atime);
            have_times = true;
        }
        if let Some(mtime) = req.mtime {
            times = times.set_modified(mtime);
            have_times = true;
        }
        if req.atime_now {
            times = times.set_accessed(now);
            have_times = true;
        }
        if req.mtime_now {
            times = times.set_modified(now);
            have_times = true;
        }
        if have_times {
            let res = self.file.set_times(times);
            if result.is_ok() {
                result = res;
            }
        }

        result
    }
}

/// Opens the page-cache copy at `path` with the kernel's open flags and
/// wraps it in a handle pinned to `inode`.
///
/// Only the access mode and `O_TRUNC` are honoured on the cached copy;
/// creation flags belong to the storage manager, which already materialized
/// the file.
pub(crate) fn open_cache_file(
    inode: Arc<Inode>,
    path: &Path,
    flags: i32,
) -> Result<FileHandle, VfsError> {
    let writable = writable_flags(flags);
    let readable = (flags & libc::O_ACCMODE) != libc::O_WRONLY;

    let file = OpenOptions::new()
        .read(readable)
        .write(writable)
        .truncate(writable && (flags & libc::O_TRUNC) != 0)
        .open(path)?;

    Ok(FileHandle {
        inode,
        file,
        writable,
        dirty: AtomicBool::new(false),
    })
}
