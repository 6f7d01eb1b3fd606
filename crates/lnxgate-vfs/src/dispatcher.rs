//! Asynchronous dispatcher for the gateway's POSIX operations.
//!
//! Every operation the kernel driver delivers lands here: the dispatcher
//! consults the inode cache, drives the storage manager, arbitrates direct
//! descriptor I/O against AIO resumption, and reconciles the cache after
//! mutations. Each entry point returns `Result`, so exactly one of the
//! success and error outcomes reaches the caller, exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! │  ┌────────────┐  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │ InodeCache │  │ IStorageManager │  │    IAioEngine    │  │
//! │  │ (ino↔node) │  │ (remote store)  │  │ (local file AIO) │  │
//! │  └────────────┘  └─────────────────┘  └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The kernel always names the root inode 1; the storage manager may know
//! it under another number. The mapping is learned from the first root
//! getattr and applied once on entry to every operation that receives
//! kernel inode numbers.

use std::{
    fs::File,
    io,
    os::unix::fs::FileExt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use lnxgate_core::{
    config::VfsConfig,
    domain::{FsStats, RemoteAttr, SetAttrRequest},
    ports::{IAioEngine, IStorageManager},
};
use tracing::{debug, error, warn};

use crate::{
    aio::{run_read, run_write},
    error::VfsError,
    handle::{flags_valid, open_cache_file, writable_flags, DirEntry, DirHandle, FileHandle},
    inode::{Inode, InodeNumber},
    inode_cache::InodeCache,
};

/// Entry points for every POSIX operation the kernel driver dispatches.
///
/// The dispatcher owns the inode cache and the two ports. It is cheap to
/// share behind an `Arc`; all interior state is synchronized.
pub struct Dispatcher {
    storage: Arc<dyn IStorageManager>,
    aio: Arc<dyn IAioEngine>,
    cache: InodeCache,
    /// The storage manager's real number for the root inode, 0 while
    /// unknown.
    root_ino: AtomicU64,
    /// Throttle window for write notifications.
    notify_interval: Duration,
    /// Attribute TTL handed to the kernel bridge with stat replies.
    attr_ttl: Duration,
    /// Entry TTL handed to the kernel bridge with lookup replies.
    entry_ttl: Duration,
    blksize: u32,
    name_max: u32,
}

impl Dispatcher {
    /// Creates a dispatcher over the given ports.
    pub fn new(
        storage: Arc<dyn IStorageManager>,
        aio: Arc<dyn IAioEngine>,
        config: VfsConfig,
    ) -> Self {
        let blksize = storage.block_size();
        let name_max = storage.name_max();

        Self {
            storage,
            aio,
            cache: InodeCache::new(),
            root_ino: AtomicU64::new(0),
            notify_interval: Duration::from_secs(config.dirty_notify_interval_secs),
            attr_ttl: Duration::from_secs(config.attr_ttl_secs),
            entry_ttl: Duration::from_secs(config.entry_ttl_secs),
            blksize,
            name_max,
        }
    }

    /// The inode cache. The kernel bridge uses it for invariant checks and
    /// introspection; it must not mutate entries behind the dispatcher.
    pub fn cache(&self) -> &InodeCache {
        &self.cache
    }

    /// TTL for attribute replies.
    pub fn attr_ttl(&self) -> Duration {
        self.attr_ttl
    }

    /// TTL for lookup replies.
    pub fn entry_ttl(&self) -> Duration {
        self.entry_ttl
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Rewrites the kernel's root number to the storage manager's, once the
    /// mapping is known. All other numbers pass through untouched.
    fn translate(&self, ino: u64) -> u64 {
        let root = self.root_ino.load(Ordering::SeqCst);
        if ino == InodeNumber::ROOT.get() && root != 0 {
            root
        } else {
            ino
        }
    }

    /// Rejects names longer than the storage manager's `name_max`. An
    /// expected condition (shells probe freely), logged quietly.
    fn check_name(&self, name: &str) -> Result<(), VfsError> {
        if name.len() > self.name_max as usize {
            debug!(
                name_len = name.len(),
                name_max = self.name_max,
                "entry name too long"
            );
            return Err(VfsError::NameTooLong(name.to_string()));
        }
        Ok(())
    }

    fn trace_failure(&self, op: &'static str, ino: u64, err: &VfsError) {
        if err.is_expected() {
            debug!(op, ino, error = %err, "operation failed");
        } else {
            error!(op, ino, error = %err, "operation failed");
        }
    }

    /// Folds a storage manager stat into the cache: an already cached inode
    /// wins, an unknown one is constructed and inserted.
    ///
    /// `root_probe` marks stats obtained by a getattr on kernel inode 1
    /// while the root mapping was unknown. The first such stat teaches the
    /// dispatcher the real root number and seeds the root's lookup count:
    /// the kernel never issues a lookup for the root inode but does forget
    /// it, so without the seed the count would go negative.
    fn reconcile_stat(&self, attr: RemoteAttr, root_probe: bool) -> Result<Arc<Inode>, VfsError> {
        attr.validate()
            .map_err(|err| VfsError::InvalidArgument(err.to_string()))?;

        let first_root_observation =
            root_probe && self.root_ino.load(Ordering::SeqCst) == 0 && attr.ino >= 1;
        if first_root_observation {
            self.root_ino.store(attr.ino, Ordering::SeqCst);
            debug!(
                root_ino = attr.ino,
                "learned the storage manager's root inode number"
            );
        }

        let inode = match self.cache.lookup(attr.ino) {
            Some(existing) => existing,
            None => self
                .cache
                .add(Arc::new(Inode::from_remote(&attr, self.blksize))),
        };

        if first_root_observation {
            inode.inc_lookup();
        }

        Ok(inode)
    }

    /// Best-effort server-side cleanup after a local open failure. A
    /// writable storage manager open leaves state behind (upload intent,
    /// page-cache pin); tell it the descriptor never materialized. Errors
    /// here are logged, never surfaced.
    fn compensate_failed_open(&self, ino: u64, flags: i32) {
        if !writable_flags(flags) {
            return;
        }

        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(err) = storage.release(ino, false).await {
                error!(ino, error = %err, "compensating release failed");
            }
        });
    }

    /// Spawns a throttled write notification when the inode is due one.
    fn maybe_notify_write(&self, inode: &Arc<Inode>) {
        if !inode.try_begin_notify(self.notify_interval) {
            return;
        }

        let ino = inode.ino().get();
        debug!(ino, "notifying the storage manager of local writes");

        let storage = Arc::clone(&self.storage);
        let inode = Arc::clone(inode);
        tokio::spawn(async move {
            match storage.notify_write(ino).await {
                Ok(()) => inode.finish_notify(true),
                Err(err) => {
                    error!(ino, error = %err, "write notification failed");
                    inode.finish_notify(false);
                }
            }
        });
    }

    /// Write-side descriptor access: marks the handle dirty, arms the
    /// notify-write throttle and bumps the inode mtime before handing the
    /// descriptor out.
    fn fd_for_writing<'a>(&self, handle: &'a FileHandle) -> Result<&'a File, VfsError> {
        let file = handle.write_file().map_err(|err| {
            error!(ino = handle.ino(), "descriptor is not open for writing");
            err
        })?;

        handle.mark_dirty();
        self.maybe_notify_write(handle.inode());
        handle.inode().update_mtime_now();

        Ok(file)
    }

    /// Cache bookkeeping shared by unlink and rmdir after the storage
    /// manager confirmed the removal.
    fn note_entry_removed(
        &self,
        parent_ino: u64,
        name: &str,
        deleted_ino: u64,
        parent: Option<Arc<Inode>>,
    ) {
        if let Some(deleted) = self.cache.lookup(deleted_ino) {
            // Eviction still waits for the kernel's forget.
            deleted.decrement_nlink();
        }

        self.cache.unindex_child(parent_ino, name);

        let parent = parent.or_else(|| self.cache.lookup(parent_ino));
        if let Some(parent) = parent {
            parent.update_mtime_now();
        }
    }

    // ------------------------------------------------------------------
    // Lookup and attributes
    // ------------------------------------------------------------------

    /// Resolves `name` under `parent_ino`. A cached child answers without
    /// storage manager traffic.
    ///
    /// The kernel bridge increments the returned inode's lookup count when
    /// it replies; the dispatcher does not.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn lookup(&self, parent_ino: u64, name: &str) -> Result<Arc<Inode>, VfsError> {
        let parent_ino = self.translate(parent_ino);
        self.check_name(name)?;

        if let Some(inode) = self.cache.lookup_child(parent_ino, name) {
            debug!(child = inode.ino().get(), "lookup served from cache");
            return Ok(inode);
        }

        let attr = self
            .storage
            .lookup_child(parent_ino, name)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("lookup", parent_ino, &err);
                err
            })?;

        let inode = self.reconcile_stat(attr, false)?;
        self.cache.index_child(parent_ino, name, inode.ino().get());
        Ok(inode)
    }

    /// Fetches the attributes of `ino`, from the cache when possible.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn getattr(&self, ino: u64) -> Result<Arc<Inode>, VfsError> {
        let root_probe = ino == InodeNumber::ROOT.get();
        let ino = self.translate(ino);

        if let Some(inode) = self.cache.lookup(ino) {
            return Ok(inode);
        }

        let attr = self.storage.getattr(ino).await.map_err(|err| {
            let err = VfsError::from(err);
            self.trace_failure("getattr", ino, &err);
            err
        })?;

        self.reconcile_stat(attr, root_probe)
    }

    /// Applies attribute changes. An empty request returns the cached inode
    /// without storage manager traffic. When the caller holds an open
    /// handle the changes are applied to the local cached copy as well.
    #[tracing::instrument(level = "debug", skip(self, handle, req))]
    pub async fn setattr(
        &self,
        ino: u64,
        handle: Option<&FileHandle>,
        req: &SetAttrRequest,
    ) -> Result<Arc<Inode>, VfsError> {
        let ino = self.translate(ino);

        let inode = match handle {
            Some(h) => Arc::clone(h.inode()),
            None => self.cache.lookup(ino).ok_or_else(|| {
                error!(ino, "setattr for an inode missing from the cache");
                VfsError::NotFound(format!("inode {ino}"))
            })?,
        };

        if req.is_empty() {
            return Ok(inode);
        }

        let now = SystemTime::now();
        inode.apply_setattr(req, now);

        if let Some(h) = handle {
            if let Err(err) = h.apply_setattr(req, now) {
                warn!(ino, error = %err, "failed to apply attributes to the cached copy");
            }
        }

        self.storage
            .setattr(ino, &inode.remote_attr(), req.size.is_some())
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("setattr", ino, &err);
                err
            })?;

        inode.update_ctime_now();
        Ok(inode)
    }

    /// Drops `nlookup` kernel references from `ino`. At zero the inode
    /// leaves the cache; holders of the `Arc` keep it alive until they
    /// finish.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn forget(&self, ino: u64, nlookup: u64) {
        let ino = self.translate(ino);

        match self.cache.lookup(ino) {
            Some(inode) => {
                if inode.dec_lookup_by(nlookup) == 0 {
                    self.cache.remove(ino);
                    debug!(ino, "inode evicted after forget");
                }
            }
            None => {
                warn!(ino, "forget for an inode not present in the cache");
            }
        }
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    /// Opens a directory: reads the full listing from the storage manager,
    /// registers every entry in the cache and returns the snapshot. The
    /// first snapshot is also installed on the inode for cached child
    /// lookups.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn opendir(&self, ino: u64) -> Result<Arc<DirHandle>, VfsError> {
        let ino = self.translate(ino);

        let dir_inode = self.cache.lookup(ino);
        if let Some(inode) = &dir_inode {
            if !inode.is_dir() {
                return Err(VfsError::NotADirectory(format!("inode {ino}")));
            }
        }

        let listing = self.storage.readdir(ino).await.map_err(|err| {
            let err = VfsError::from(err);
            self.trace_failure("opendir", ino, &err);
            err
        })?;

        let mut entries = Vec::with_capacity(listing.entries.len());
        for remote in listing.entries {
            let child = self.reconcile_stat(remote.attr, false)?;
            self.cache.index_child(ino, &remote.name, child.ino().get());
            entries.push(DirEntry {
                name: remote.name,
                inode: child,
            });
        }

        let handle = Arc::new(DirHandle::new(entries, listing.use_dir_index));

        if let Some(inode) = dir_inode {
            if inode.adopt_dir_handle(&handle) {
                debug!(ino, "cached directory snapshot on the inode");
            }
        }

        Ok(handle)
    }

    /// Releases a directory snapshot. Purely local; the inode may keep its
    /// own copy for child lookups.
    pub fn releasedir(&self, ino: u64, handle: Arc<DirHandle>) {
        debug!(
            ino,
            entries = handle.entries_count(),
            "releasing directory snapshot"
        );
        drop(handle);
    }

    /// Creates a directory under `parent_ino`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn mkdir(
        &self,
        parent_ino: u64,
        name: &str,
        uid: u32,
        gid: u32,
        mode: u32,
    ) -> Result<Arc<Inode>, VfsError> {
        let parent_ino = self.translate(parent_ino);
        self.check_name(name)?;

        let parent = self.cache.lookup(parent_ino);
        if let Some(parent) = &parent {
            if !parent.is_dir() {
                return Err(VfsError::NotADirectory(format!("inode {parent_ino}")));
            }
        }

        let attr = self
            .storage
            .mkdir(parent_ino, name, uid, gid, mode)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("mkdir", parent_ino, &err);
                err
            })?;

        if let Some(parent) = &parent {
            parent.update_mtime_now();
        }

        let inode = self.reconcile_stat(attr, false)?;
        self.cache.index_child(parent_ino, name, inode.ino().get());
        Ok(inode)
    }

    /// Removes the empty directory `name` under `parent_ino`. A non-empty
    /// target is the storage manager's call (`ENOTEMPTY`).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn rmdir(&self, parent_ino: u64, name: &str) -> Result<(), VfsError> {
        let parent_ino = self.translate(parent_ino);
        self.check_name(name)?;

        let parent = self.cache.lookup(parent_ino);
        if let Some(parent) = &parent {
            if !parent.is_dir() {
                return Err(VfsError::NotADirectory(format!("inode {parent_ino}")));
            }
        }

        let deleted = self.storage.rmdir(parent_ino, name).await.map_err(|err| {
            let err = VfsError::from(err);
            self.trace_failure("rmdir", parent_ino, &err);
            err
        })?;

        self.note_entry_removed(parent_ino, name, deleted, parent);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Opens `ino` for I/O. The storage manager materializes the object in
    /// the local page cache and returns the path; the dispatcher owns the
    /// descriptor it opens there.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn open(&self, ino: u64, flags: i32) -> Result<Arc<FileHandle>, VfsError> {
        if !flags_valid(flags) {
            return Err(VfsError::InvalidArgument(format!("open flags {flags:#x}")));
        }

        let inode = self.cache.lookup(ino).ok_or_else(|| {
            error!(ino, "open for an inode the kernel never looked up");
            VfsError::NotFound(format!("inode {ino}"))
        })?;

        if inode.is_dir() && writable_flags(flags) {
            return Err(VfsError::IsADirectory(format!("inode {ino}")));
        }

        let path = self.storage.open(ino, flags).await.map_err(|err| {
            let err = VfsError::from(err);
            self.trace_failure("open", ino, &err);
            err
        })?;

        match open_cache_file(Arc::clone(&inode), &path, flags) {
            Ok(handle) => {
                inode.update_atime(SystemTime::now());
                Ok(Arc::new(handle))
            }
            Err(err) => {
                error!(ino, path = %path.display(), error = %err, "failed to open the local cached copy");
                self.compensate_failed_open(ino, flags);
                Err(err)
            }
        }
    }

    /// Creates `name` under `parent_ino` and opens it, in one storage
    /// manager round trip.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn create(
        &self,
        parent_ino: u64,
        name: &str,
        uid: u32,
        gid: u32,
        mode: u32,
        flags: i32,
    ) -> Result<(Arc<Inode>, Arc<FileHandle>), VfsError> {
        if !flags_valid(flags) {
            return Err(VfsError::InvalidArgument(format!("open flags {flags:#x}")));
        }

        let parent_ino = self.translate(parent_ino);
        self.check_name(name)?;

        let parent = self.cache.lookup(parent_ino);
        if let Some(parent) = &parent {
            if !parent.is_dir() {
                return Err(VfsError::NotADirectory(format!("inode {parent_ino}")));
            }
        }

        let (attr, path) = self
            .storage
            .create_and_open(parent_ino, name, uid, gid, mode, flags)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("create", parent_ino, &err);
                err
            })?;

        if let Some(parent) = &parent {
            parent.update_mtime_now();
        }

        let inode = self.reconcile_stat(attr, false)?;
        self.cache.index_child(parent_ino, name, inode.ino().get());

        match open_cache_file(Arc::clone(&inode), &path, flags) {
            Ok(handle) => Ok((inode, Arc::new(handle))),
            Err(err) => {
                error!(
                    ino = inode.ino().get(),
                    path = %path.display(),
                    error = %err,
                    "failed to open the local copy of a created file"
                );
                self.compensate_failed_open(inode.ino().get(), flags);
                Err(err)
            }
        }
    }

    /// Reads up to `size` bytes at `offset` through `handle`.
    ///
    /// The direct `pread` is tried first; when it cannot satisfy the whole
    /// request the remainder runs through the AIO engine. A read at or past
    /// end of file completes with an empty buffer without touching AIO.
    #[tracing::instrument(level = "debug", skip(self, handle), fields(ino = handle.ino()))]
    pub async fn read(
        &self,
        handle: &FileHandle,
        size: usize,
        offset: u64,
    ) -> Result<Vec<u8>, VfsError> {
        if size == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; size];

        match handle.file().read_at(&mut buf, offset) {
            // End of file.
            Ok(0) => Ok(Vec::new()),
            Ok(got) if got == size => Ok(buf),
            Ok(got) => run_read(&*self.aio, handle.raw_fd(), buf, offset, got).await,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                run_read(&*self.aio, handle.raw_fd(), buf, offset, 0).await
            }
            Err(err) => {
                error!(ino = handle.ino(), offset, size, error = %err, "read failed");
                Err(VfsError::Io(err))
            }
        }
    }

    /// Writes `data` at `offset` through `handle`, returning the byte
    /// count. Acquiring the write descriptor marks the handle dirty and may
    /// schedule a write notification; terminal success refreshes the inode
    /// attributes from the descriptor.
    #[tracing::instrument(level = "debug", skip(self, handle, data), fields(ino = handle.ino(), len = data.len()))]
    pub async fn write(
        &self,
        handle: &FileHandle,
        data: &[u8],
        offset: u64,
    ) -> Result<usize, VfsError> {
        if data.is_empty() {
            return Ok(0);
        }

        let file = self.fd_for_writing(handle)?;

        let written = match file.write_at(data, offset) {
            Ok(written) if written == data.len() || written == 0 => Ok(written),
            Ok(written) => run_write(&*self.aio, handle.raw_fd(), data, offset, written).await,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                run_write(&*self.aio, handle.raw_fd(), data, offset, 0).await
            }
            Err(err) => {
                error!(ino = handle.ino(), offset, error = %err, "write failed");
                Err(VfsError::Io(err))
            }
        }?;

        if let Err(err) = handle.refresh_inode_from_fd() {
            warn!(ino = handle.ino(), error = %err, "failed to refresh attributes after write");
        }

        Ok(written)
    }

    /// Flushes the cached copy to disk, then tells the storage manager the
    /// object changed. Unlike the throttled write-path notification, a
    /// failure here fails the fsync.
    #[tracing::instrument(level = "debug", skip(self, handle), fields(ino = handle.ino()))]
    pub async fn fsync(&self, handle: &FileHandle, datasync: bool) -> Result<(), VfsError> {
        handle.write_file().map_err(|err| {
            error!(ino = handle.ino(), "fsync on a read-only descriptor");
            err
        })?;

        self.aio
            .fsync(handle.raw_fd(), datasync)
            .await
            .map_err(|err| {
                error!(ino = handle.ino(), error = %err, "AIO fsync failed");
                VfsError::Io(err)
            })?;

        if let Err(err) = handle.refresh_inode_from_fd() {
            warn!(ino = handle.ino(), error = %err, "failed to refresh attributes after fsync");
        }

        self.storage
            .notify_write(handle.ino())
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                error!(ino = handle.ino(), error = %err, "write notification after fsync failed");
                err
            })?;

        handle.inode().mark_dirty_notified();
        Ok(())
    }

    /// Closes a file handle. The storage manager learns whether the cached
    /// copy is dirty; its errors are logged, never surfaced, and the handle
    /// is dropped either way.
    #[tracing::instrument(level = "debug", skip(self, handle), fields(ino = handle.ino()))]
    pub async fn release(&self, handle: Arc<FileHandle>) {
        let ino = handle.ino();
        let dirty = handle.is_dirty();

        if let Err(err) = self.storage.release(ino, dirty).await {
            error!(ino, dirty, error = %err, "release failed on the storage manager");
        }

        drop(handle);
    }

    // ------------------------------------------------------------------
    // Namespace mutation
    // ------------------------------------------------------------------

    /// Removes the file or symlink `name` under `parent_ino`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn unlink(&self, parent_ino: u64, name: &str) -> Result<(), VfsError> {
        let parent_ino = self.translate(parent_ino);
        self.check_name(name)?;

        let unlinked = self
            .storage
            .unlink(parent_ino, name)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("unlink", parent_ino, &err);
                err
            })?;

        self.note_entry_removed(parent_ino, name, unlinked, None);
        Ok(())
    }

    /// Renames `old_name` under `old_parent_ino` to `new_name` under
    /// `new_parent_ino`, replacing a permitted existing target.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn rename(
        &self,
        old_parent_ino: u64,
        old_name: &str,
        new_parent_ino: u64,
        new_name: &str,
    ) -> Result<(), VfsError> {
        let old_parent_ino = self.translate(old_parent_ino);
        let new_parent_ino = self.translate(new_parent_ino);
        self.check_name(old_name)?;
        self.check_name(new_name)?;

        let outcome = self
            .storage
            .rename(old_parent_ino, old_name, new_parent_ino, new_name)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("rename", old_parent_ino, &err);
                err
            })?;

        if let Some(renamed) = self.cache.lookup(outcome.renamed) {
            renamed.update_ctime_now();
        }

        if let Some(old_parent) = self.cache.lookup(old_parent_ino) {
            old_parent.update_mtime_now();
        }

        if new_parent_ino != old_parent_ino {
            if let Some(new_parent) = self.cache.lookup(new_parent_ino) {
                new_parent.update_mtime_now();
            }
        }

        if let Some(deleted_ino) = outcome.deleted {
            if let Some(deleted) = self.cache.lookup(deleted_ino) {
                // Replaced target: one link gone, eviction still waits for
                // the kernel's forget.
                deleted.decrement_nlink();
            }
        }

        self.cache.unindex_child(old_parent_ino, old_name);
        self.cache
            .index_child(new_parent_ino, new_name, outcome.renamed);
        Ok(())
    }

    /// Adds a hard link to `ino` as `new_name` under `new_parent_ino`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn hardlink(
        &self,
        ino: u64,
        new_parent_ino: u64,
        new_name: &str,
    ) -> Result<Arc<Inode>, VfsError> {
        let ino = self.translate(ino);
        let new_parent_ino = self.translate(new_parent_ino);
        self.check_name(new_name)?;

        let attr = self
            .storage
            .hardlink(ino, new_parent_ino, new_name)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("hardlink", ino, &err);
                err
            })?;

        if let Some(new_parent) = self.cache.lookup(new_parent_ino) {
            new_parent.update_mtime_now();
        }

        let inode = match self.cache.lookup(ino) {
            Some(existing) => {
                // Bumps nlink and ctime on the cached attributes.
                existing.increment_nlink();
                existing
            }
            None => self.reconcile_stat(attr, false)?,
        };

        self.cache
            .index_child(new_parent_ino, new_name, inode.ino().get());
        Ok(inode)
    }

    /// Creates a symlink to `target` as `new_name` under `new_parent_ino`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn symlink(
        &self,
        target: &str,
        new_parent_ino: u64,
        new_name: &str,
        uid: u32,
        gid: u32,
    ) -> Result<Arc<Inode>, VfsError> {
        let new_parent_ino = self.translate(new_parent_ino);
        self.check_name(new_name)?;

        let attr = self
            .storage
            .symlink(target, new_parent_ino, new_name, uid, gid)
            .await
            .map_err(|err| {
                let err = VfsError::from(err);
                self.trace_failure("symlink", new_parent_ino, &err);
                err
            })?;

        if let Some(parent) = self.cache.lookup(new_parent_ino) {
            parent.update_mtime_now();
        }

        let inode = self.reconcile_stat(attr, false)?;
        self.cache
            .index_child(new_parent_ino, new_name, inode.ino().get());
        Ok(inode)
    }

    /// Reads the target of the symlink `ino`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn readlink(&self, ino: u64) -> Result<String, VfsError> {
        self.storage.readlink(ino).await.map_err(|err| {
            let err = VfsError::from(err);
            self.trace_failure("readlink", ino, &err);
            err
        })
    }

    // ------------------------------------------------------------------
    // Filesystem statistics
    // ------------------------------------------------------------------

    /// Synthesized filesystem statistics. The object store has no real
    /// block or inode accounting, so the counts are a large fixed sentinel;
    /// block size and name length come from the storage manager's
    /// configuration.
    pub fn statfs(&self, _ino: u64) -> FsStats {
        FsStats {
            block_size: self.blksize,
            blocks: u64::MAX / 1024,
            blocks_free: u64::MAX / 1024,
            blocks_available: u64::MAX / 1024,
            files: u64::MAX / 1024,
            files_free: u64::MAX / 1024,
            files_available: u64::MAX / 1024,
            name_max: self.name_max,
        }
    }
}
