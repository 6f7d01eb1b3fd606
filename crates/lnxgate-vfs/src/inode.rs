//! In-memory inode representation.
//!
//! One `Inode` exists per filesystem object known to the kernel. The inode
//! cache holds one strong reference; handles and in-flight operations hold
//! their own, so `Arc::strong_count` is the object's reference count.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::{Duration, Instant, SystemTime},
};

use fuser::{FileAttr, FileType};
use lnxgate_core::domain::{NodeKind, RemoteAttr, SetAttrRequest};
use tracing::warn;

use crate::handle::DirHandle;

/// A newtype wrapper for kernel-visible inode numbers.
///
/// Provides type safety to prevent accidental mixing of raw u64 values
/// with inode identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeNumber(u64);

impl InodeNumber {
    /// Root inode number (always 1 per FUSE convention). The storage
    /// manager may know the root under a different number; the dispatcher
    /// translates on entry.
    pub const ROOT: InodeNumber = InodeNumber(1);

    /// Create a new inode number
    pub fn new(val: u64) -> Self {
        InodeNumber(val)
    }

    /// Get the raw u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for InodeNumber {
    fn from(val: u64) -> Self {
        InodeNumber(val)
    }
}

impl From<InodeNumber> for u64 {
    fn from(ino: InodeNumber) -> Self {
        ino.0
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn kind_to_file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::File => FileType::RegularFile,
        NodeKind::Directory => FileType::Directory,
        NodeKind::Symlink => FileType::Symlink,
    }
}

fn file_type_to_kind(kind: FileType) -> NodeKind {
    match kind {
        FileType::Directory => NodeKind::Directory,
        FileType::Symlink => NodeKind::Symlink,
        _ => NodeKind::File,
    }
}

/// In-memory representation of one filesystem object.
///
/// Holds the POSIX attributes, the kernel lookup count, and the cached
/// directory snapshot for directories. Attribute mutations happen on
/// dispatcher completions and setattr only.
///
/// ## Counters
///
/// - `lookup_count` follows the FUSE contract: the kernel bridge increments
///   it once per stat-returning reply, `forget` decrements it in bulk. When
///   it reaches zero the inode leaves the cache. The dispatcher itself only
///   touches the positive side once, for the root inode, which the kernel
///   never looks up but does forget.
/// - The reference count is `Arc::strong_count`; there is no hand-rolled
///   counter to keep in sync.
#[derive(Debug)]
pub struct Inode {
    /// Kernel-visible inode number, immutable for the inode's lifetime.
    ino: InodeNumber,

    /// POSIX stat surface. `attr.ino` always equals `ino`.
    attr: RwLock<FileAttr>,

    /// Kernel reference count (incremented per lookup reply, decremented by
    /// forget).
    lookup_count: AtomicU64,

    /// Cached directory listing installed by the first opendir, used to
    /// answer child-name lookups without a storage manager round trip.
    /// This is the single back-edge of the handle graph; it is detached
    /// when the inode is evicted.
    dir_handle: Mutex<Option<Arc<DirHandle>>>,

    /// When the storage manager last acknowledged a write notification.
    dirty_notified: Mutex<Option<Instant>>,

    /// A write notification is currently in flight.
    notify_pending: AtomicBool,
}

impl Inode {
    /// Builds an inode from a storage manager stat. `blksize` is the
    /// gateway block size reported through statfs.
    pub fn from_remote(remote: &RemoteAttr, blksize: u32) -> Self {
        let attr = FileAttr {
            ino: remote.ino,
            size: remote.size,
            blocks: remote.size.div_ceil(512),
            atime: remote.atime,
            mtime: remote.mtime,
            ctime: remote.ctime,
            crtime: remote.ctime,
            kind: kind_to_file_type(remote.kind),
            perm: remote.perm,
            nlink: remote.nlink,
            uid: remote.uid,
            gid: remote.gid,
            rdev: 0,
            blksize,
            flags: 0,
        };

        Self {
            ino: InodeNumber::new(remote.ino),
            attr: RwLock::new(attr),
            lookup_count: AtomicU64::new(0),
            dir_handle: Mutex::new(None),
            dirty_notified: Mutex::new(None),
            notify_pending: AtomicBool::new(false),
        }
    }

    /// Returns the inode number.
    pub fn ino(&self) -> InodeNumber {
        self.ino
    }

    /// Snapshot of the current attributes.
    pub fn attr(&self) -> FileAttr {
        *self.attr.read().unwrap()
    }

    /// Returns true if this inode is a directory.
    pub fn is_dir(&self) -> bool {
        self.attr.read().unwrap().kind == FileType::Directory
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        self.attr.read().unwrap().size
    }

    /// Current hard link count.
    pub fn nlink(&self) -> u32 {
        self.attr.read().unwrap().nlink
    }

    /// Attributes in the storage manager's DTO shape, as sent with setattr.
    pub fn remote_attr(&self) -> RemoteAttr {
        let attr = self.attr.read().unwrap();
        RemoteAttr {
            ino: attr.ino,
            kind: file_type_to_kind(attr.kind),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: attr.uid,
            gid: attr.gid,
            size: attr.size,
            atime: attr.atime,
            mtime: attr.mtime,
            ctime: attr.ctime,
        }
    }

    // ------------------------------------------------------------------
    // Lookup counting
    // ------------------------------------------------------------------

    /// Returns the current kernel lookup count.
    pub fn lookup_count(&self) -> u64 {
        self.lookup_count.load(Ordering::SeqCst)
    }

    /// Increments the kernel lookup count.
    pub fn inc_lookup(&self) {
        self.lookup_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the lookup count by `count`, saturating at zero, and
    /// returns the new value.
    pub fn dec_lookup_by(&self, count: u64) -> u64 {
        let mut current = self.lookup_count.load(Ordering::SeqCst);
        loop {
            let new = current.saturating_sub(count);
            match self.lookup_count.compare_exchange(
                current,
                new,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    if count > current {
                        warn!(
                            ino = self.ino.get(),
                            count, current, "forget exceeds the lookup count"
                        );
                    }
                    return new;
                }
                Err(observed) => current = observed,
            }
        }
    }

    // ------------------------------------------------------------------
    // Attribute mutation
    // ------------------------------------------------------------------

    /// Sets the access time.
    pub fn update_atime(&self, when: SystemTime) {
        self.attr.write().unwrap().atime = when;
    }

    /// Sets the modification time to now.
    pub fn update_mtime_now(&self) {
        self.attr.write().unwrap().mtime = SystemTime::now();
    }

    /// Sets the metadata change time to now.
    pub fn update_ctime_now(&self) {
        self.attr.write().unwrap().ctime = SystemTime::now();
    }

    /// Writes back size and mtime observed on the local cached file.
    pub fn refresh_local(&self, size: u64, mtime: SystemTime) {
        let mut attr = self.attr.write().unwrap();
        attr.size = size;
        attr.blocks = size.div_ceil(512);
        attr.mtime = mtime;
    }

    /// Increments the hard link count and bumps ctime.
    pub fn increment_nlink(&self) {
        let mut attr = self.attr.write().unwrap();
        attr.nlink += 1;
        attr.ctime = SystemTime::now();
    }

    /// Decrements the hard link count, saturating at zero.
    pub fn decrement_nlink(&self) {
        let mut attr = self.attr.write().unwrap();
        if attr.nlink == 0 {
            warn!(ino = self.ino.get(), "link count underflow");
            return;
        }
        attr.nlink -= 1;
        attr.ctime = SystemTime::now();
    }

    /// Applies a setattr request to the in-memory attributes. `now` is the
    /// timestamp substituted for the `*_now` bits.
    pub fn apply_setattr(&self, req: &SetAttrRequest, now: SystemTime) {
        let mut attr = self.attr.write().unwrap();

        if let Some(mode) = req.mode {
            attr.perm = (mode & 0o7777) as u16;
        }
        if let Some(size) = req.size {
            attr.size = size;
            attr.blocks = size.div_ceil(512);
        }
        if let Some(atime) = req.atime {
            attr.atime = atime;
        }
        if let Some(mtime) = req.mtime {
            attr.mtime = mtime;
        }
        if req.atime_now {
            attr.atime = now;
        }
        if req.mtime_now {
            attr.mtime = now;
        }
    }

    // ------------------------------------------------------------------
    // Cached directory handle
    // ------------------------------------------------------------------

    /// Returns the cached directory snapshot, if one is installed.
    pub fn dir_handle(&self) -> Option<Arc<DirHandle>> {
        self.dir_handle.lock().unwrap().clone()
    }

    /// Installs `handle` as the cached directory snapshot if none is
    /// present. Returns true when the handle was adopted.
    pub fn adopt_dir_handle(&self, handle: &Arc<DirHandle>) -> bool {
        let mut slot = self.dir_handle.lock().unwrap();
        if slot.is_none() {
            *slot = Some(Arc::clone(handle));
            true
        } else {
            false
        }
    }

    /// Drops the cached directory snapshot. Called on cache eviction to
    /// break the inode -> handle -> child inode edge.
    pub fn detach_dir_handle(&self) {
        self.dir_handle.lock().unwrap().take();
    }

    // ------------------------------------------------------------------
    // Write notification throttle
    // ------------------------------------------------------------------

    /// Claims the right to send a write notification. Returns false when a
    /// notification is already in flight or the last acknowledged one is
    /// younger than `interval`.
    pub fn try_begin_notify(&self, interval: Duration) -> bool {
        {
            let last = self.dirty_notified.lock().unwrap();
            if let Some(at) = *last {
                if at.elapsed() < interval {
                    return false;
                }
            }
        }

        self.notify_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Completes an in-flight write notification. Acknowledged
    /// notifications refresh the throttle timestamp; failed ones only clear
    /// the in-flight flag so the next write can retry.
    pub fn finish_notify(&self, acknowledged: bool) {
        if acknowledged {
            self.mark_dirty_notified();
        }
        self.notify_pending.store(false, Ordering::SeqCst);
    }

    /// Records that the storage manager acknowledged a write notification,
    /// restarting the throttle interval. The fsync path calls this
    /// directly since its notification bypasses the throttle.
    pub fn mark_dirty_notified(&self) {
        *self.dirty_notified.lock().unwrap() = Some(Instant::now());
    }

    /// When the storage manager last acknowledged a write notification.
    pub fn last_dirty_notified(&self) -> Option<Instant> {
        *self.dirty_notified.lock().unwrap()
    }
}
