//! Shared fixtures for dispatcher integration tests: a scriptable storage
//! manager, a scriptable AIO engine and attribute builders.

use std::{
    collections::{HashMap, VecDeque},
    io,
    os::unix::io::RawFd,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use lnxgate_core::{
    config::VfsConfig,
    domain::{DirListing, NodeKind, RemoteAttr, RemoteDirEntry},
    ports::{IAioEngine, IStorageManager, RenameOutcome, StorageError, StorageResult},
};
use lnxgate_vfs::Dispatcher;

/// One recorded storage manager invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LookupChild(u64, String),
    Getattr(u64),
    Readdir(u64),
    Open(u64, i32),
    CreateAndOpen(u64, String),
    Release(u64, bool),
    Setattr(u64, bool),
    Mkdir(u64, String),
    Rmdir(u64, String),
    Unlink(u64, String),
    Rename(u64, String, u64, String),
    Hardlink(u64, u64, String),
    Symlink(u64, String),
    Readlink(u64),
    NotifyWrite(u64),
}

fn storage_err(errno: i32) -> StorageError {
    match errno {
        libc::ENOENT => StorageError::NotFound,
        libc::ENOTDIR => StorageError::NotADirectory,
        libc::EISDIR => StorageError::IsADirectory,
        libc::ENAMETOOLONG => StorageError::NameTooLong,
        libc::ENOTEMPTY => StorageError::NotEmpty,
        other => StorageError::Errno(other),
    }
}

type Scripted<K, V> = Mutex<HashMap<K, Result<V, i32>>>;

/// Storage manager double: every operation records itself and answers from
/// a per-operation script. Unscripted lookups report `NotFound`.
#[derive(Default)]
pub struct MockStorageManager {
    pub calls: Mutex<Vec<Call>>,
    lookups: Scripted<(u64, String), RemoteAttr>,
    getattrs: Scripted<u64, RemoteAttr>,
    readdirs: Scripted<u64, DirListing>,
    opens: Scripted<u64, PathBuf>,
    creates: Scripted<(u64, String), (RemoteAttr, PathBuf)>,
    mkdirs: Scripted<(u64, String), RemoteAttr>,
    rmdirs: Scripted<(u64, String), u64>,
    unlinks: Scripted<(u64, String), u64>,
    renames: Scripted<(u64, String, u64, String), RenameOutcome>,
    hardlinks: Scripted<(u64, u64, String), RemoteAttr>,
    symlinks: Scripted<(u64, String), RemoteAttr>,
    readlinks: Scripted<u64, String>,
    release_errno: Mutex<Option<i32>>,
    setattr_errno: Mutex<Option<i32>>,
    notify_errno: Mutex<Option<i32>>,
}

impl MockStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn script_lookup(&self, parent: u64, name: &str, reply: Result<RemoteAttr, i32>) {
        self.lookups
            .lock()
            .unwrap()
            .insert((parent, name.to_string()), reply);
    }

    pub fn script_getattr(&self, ino: u64, reply: Result<RemoteAttr, i32>) {
        self.getattrs.lock().unwrap().insert(ino, reply);
    }

    pub fn script_readdir(&self, ino: u64, reply: Result<DirListing, i32>) {
        self.readdirs.lock().unwrap().insert(ino, reply);
    }

    pub fn script_open(&self, ino: u64, reply: Result<PathBuf, i32>) {
        self.opens.lock().unwrap().insert(ino, reply);
    }

    pub fn script_create(&self, parent: u64, name: &str, reply: Result<(RemoteAttr, PathBuf), i32>) {
        self.creates
            .lock()
            .unwrap()
            .insert((parent, name.to_string()), reply);
    }

    pub fn script_mkdir(&self, parent: u64, name: &str, reply: Result<RemoteAttr, i32>) {
        self.mkdirs
            .lock()
            .unwrap()
            .insert((parent, name.to_string()), reply);
    }

    pub fn script_rmdir(&self, parent: u64, name: &str, reply: Result<u64, i32>) {
        self.rmdirs
            .lock()
            .unwrap()
            .insert((parent, name.to_string()), reply);
    }

    pub fn script_unlink(&self, parent: u64, name: &str, reply: Result<u64, i32>) {
        self.unlinks
            .lock()
            .unwrap()
            .insert((parent, name.to_string()), reply);
    }

    pub fn script_rename(
        &self,
        old_parent: u64,
        old_name: &str,
        new_parent: u64,
        new_name: &str,
        reply: Result<RenameOutcome, i32>,
    ) {
        self.renames.lock().unwrap().insert(
            (
                old_parent,
                old_name.to_string(),
                new_parent,
                new_name.to_string(),
            ),
            reply,
        );
    }

    pub fn script_hardlink(
        &self,
        ino: u64,
        new_parent: u64,
        new_name: &str,
        reply: Result<RemoteAttr, i32>,
    ) {
        self.hardlinks
            .lock()
            .unwrap()
            .insert((ino, new_parent, new_name.to_string()), reply);
    }

    pub fn script_symlink(&self, new_parent: u64, new_name: &str, reply: Result<RemoteAttr, i32>) {
        self.symlinks
            .lock()
            .unwrap()
            .insert((new_parent, new_name.to_string()), reply);
    }

    pub fn script_readlink(&self, ino: u64, reply: Result<String, i32>) {
        self.readlinks.lock().unwrap().insert(ino, reply);
    }

    pub fn fail_release(&self, errno: i32) {
        *self.release_errno.lock().unwrap() = Some(errno);
    }

    pub fn fail_notify(&self, errno: i32) {
        *self.notify_errno.lock().unwrap() = Some(errno);
    }

    fn take<K, V>(map: &Scripted<K, V>, key: &K) -> StorageResult<V>
    where
        K: std::hash::Hash + Eq,
    {
        match map.lock().unwrap().remove(key) {
            Some(Ok(value)) => Ok(value),
            Some(Err(errno)) => Err(storage_err(errno)),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait::async_trait]
impl IStorageManager for MockStorageManager {
    async fn lookup_child(&self, parent_ino: u64, name: &str) -> StorageResult<RemoteAttr> {
        self.record(Call::LookupChild(parent_ino, name.to_string()));
        Self::take(&self.lookups, &(parent_ino, name.to_string()))
    }

    async fn getattr(&self, ino: u64) -> StorageResult<RemoteAttr> {
        self.record(Call::Getattr(ino));
        Self::take(&self.getattrs, &ino)
    }

    async fn readdir(&self, ino: u64) -> StorageResult<DirListing> {
        self.record(Call::Readdir(ino));
        Self::take(&self.readdirs, &ino)
    }

    async fn open(&self, ino: u64, flags: i32) -> StorageResult<PathBuf> {
        self.record(Call::Open(ino, flags));
        Self::take(&self.opens, &ino)
    }

    async fn create_and_open(
        &self,
        parent_ino: u64,
        name: &str,
        _uid: u32,
        _gid: u32,
        _mode: u32,
        _flags: i32,
    ) -> StorageResult<(RemoteAttr, PathBuf)> {
        self.record(Call::CreateAndOpen(parent_ino, name.to_string()));
        Self::take(&self.creates, &(parent_ino, name.to_string()))
    }

    async fn release(&self, ino: u64, dirty: bool) -> StorageResult<()> {
        self.record(Call::Release(ino, dirty));
        match *self.release_errno.lock().unwrap() {
            Some(errno) => Err(storage_err(errno)),
            None => Ok(()),
        }
    }

    async fn setattr(&self, ino: u64, _attr: &RemoteAttr, size_changed: bool) -> StorageResult<()> {
        self.record(Call::Setattr(ino, size_changed));
        match *self.setattr_errno.lock().unwrap() {
            Some(errno) => Err(storage_err(errno)),
            None => Ok(()),
        }
    }

    async fn mkdir(
        &self,
        parent_ino: u64,
        name: &str,
        _uid: u32,
        _gid: u32,
        _mode: u32,
    ) -> StorageResult<RemoteAttr> {
        self.record(Call::Mkdir(parent_ino, name.to_string()));
        Self::take(&self.mkdirs, &(parent_ino, name.to_string()))
    }

    async fn rmdir(&self, parent_ino: u64, name: &str) -> StorageResult<u64> {
        self.record(Call::Rmdir(parent_ino, name.to_string()));
        Self::take(&self.rmdirs, &(parent_ino, name.to_string()))
    }

    async fn unlink(&self, parent_ino: u64, name: &str) -> StorageResult<u64> {
        self.record(Call::Unlink(parent_ino, name.to_string()));
        Self::take(&self.unlinks, &(parent_ino, name.to_string()))
    }

    async fn rename(
        &self,
        old_parent_ino: u64,
        old_name: &str,
        new_parent_ino: u64,
        new_name: &str,
    ) -> StorageResult<RenameOutcome> {
        self.record(Call::Rename(
            old_parent_ino,
            old_name.to_string(),
            new_parent_ino,
            new_name.to_string(),
        ));
        Self::take(
            &self.renames,
            &(
                old_parent_ino,
                old_name.to_string(),
                new_parent_ino,
                new_name.to_string(),
            ),
        )
    }

    async fn hardlink(
        &self,
        ino: u64,
        new_parent_ino: u64,
        new_name: &str,
    ) -> StorageResult<RemoteAttr> {
        self.record(Call::Hardlink(ino, new_parent_ino, new_name.to_string()));
        Self::take(&self.hardlinks, &(ino, new_parent_ino, new_name.to_string()))
    }

    async fn symlink(
        &self,
        _target: &str,
        new_parent_ino: u64,
        new_name: &str,
        _uid: u32,
        _gid: u32,
    ) -> StorageResult<RemoteAttr> {
        self.record(Call::Symlink(new_parent_ino, new_name.to_string()));
        Self::take(&self.symlinks, &(new_parent_ino, new_name.to_string()))
    }

    async fn readlink(&self, ino: u64) -> StorageResult<String> {
        self.record(Call::Readlink(ino));
        Self::take(&self.readlinks, &ino)
    }

    async fn notify_write(&self, ino: u64) -> StorageResult<()> {
        self.record(Call::NotifyWrite(ino));
        match *self.notify_errno.lock().unwrap() {
            Some(errno) => Err(storage_err(errno)),
            None => Ok(()),
        }
    }

    fn block_size(&self) -> u32 {
        4096
    }

    fn name_max(&self) -> u32 {
        255
    }
}

/// AIO double: reads come from a scripted chunk queue (empty queue means
/// end of file), writes land on the real descriptor, fsyncs are recorded.
#[derive(Default)]
pub struct MockAio {
    pub read_chunks: Mutex<VecDeque<Vec<u8>>>,
    pub fsyncs: Mutex<Vec<(RawFd, bool)>>,
    fsync_errno: Mutex<Option<i32>>,
}

impl MockAio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_read_chunks(&self, chunks: Vec<Vec<u8>>) {
        *self.read_chunks.lock().unwrap() = chunks.into();
    }

    pub fn fail_fsync(&self, errno: i32) {
        *self.fsync_errno.lock().unwrap() = Some(errno);
    }
}

#[async_trait::async_trait]
impl IAioEngine for MockAio {
    async fn read_at(&self, _fd: RawFd, len: usize, _offset: u64) -> io::Result<Vec<u8>> {
        let mut chunks = self.read_chunks.lock().unwrap();
        match chunks.pop_front() {
            Some(mut chunk) => {
                chunk.truncate(len);
                Ok(chunk)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn write_at(&self, fd: RawFd, buf: &[u8], offset: u64) -> io::Result<usize> {
        let written = unsafe {
            libc::pwrite(
                fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                offset as libc::off_t,
            )
        };
        if written < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(written as usize)
    }

    async fn fsync(&self, fd: RawFd, datasync: bool) -> io::Result<()> {
        self.fsyncs.lock().unwrap().push((fd, datasync));
        match *self.fsync_errno.lock().unwrap() {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }
}

/// An attribute stamped ten seconds in the past so "timestamp was bumped"
/// assertions can use strict comparison.
fn base_attr(ino: u64, kind: NodeKind, size: u64) -> RemoteAttr {
    let then = SystemTime::now() - Duration::from_secs(10);
    RemoteAttr {
        ino,
        kind,
        perm: if kind == NodeKind::Directory {
            0o755
        } else {
            0o644
        },
        nlink: 1,
        uid: 1000,
        gid: 1000,
        size,
        atime: then,
        mtime: then,
        ctime: then,
    }
}

pub fn file_attr(ino: u64, size: u64) -> RemoteAttr {
    base_attr(ino, NodeKind::File, size)
}

pub fn dir_attr(ino: u64) -> RemoteAttr {
    base_attr(ino, NodeKind::Directory, 0)
}

pub fn symlink_attr(ino: u64) -> RemoteAttr {
    base_attr(ino, NodeKind::Symlink, 0)
}

pub fn listing(entries: Vec<(&str, RemoteAttr)>, use_dir_index: bool) -> DirListing {
    DirListing {
        entries: entries
            .into_iter()
            .map(|(name, attr)| RemoteDirEntry {
                name: name.to_string(),
                attr,
            })
            .collect(),
        use_dir_index,
    }
}

/// A dispatcher over fresh mocks with the default configuration.
pub fn fixture() -> (Arc<MockStorageManager>, Arc<MockAio>, Dispatcher) {
    let storage = Arc::new(MockStorageManager::new());
    let aio = Arc::new(MockAio::new());
    let storage_port: Arc<dyn IStorageManager> = storage.clone() as Arc<dyn IStorageManager>;
    let aio_port: Arc<dyn IAioEngine> = aio.clone() as Arc<dyn IAioEngine>;
    let dispatcher = Dispatcher::new(storage_port, aio_port, VfsConfig::default());
    (storage, aio, dispatcher)
}

/// Waits for a condition driven by a spawned task.
pub async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
