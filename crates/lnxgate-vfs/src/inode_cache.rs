//! Inode cache: the number -> inode table plus the child-name index.
//!
//! The cache is the sole strong owner of inodes that no handle or in-flight
//! operation references. Eviction is driven by the kernel's forget contract,
//! never by capacity.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

use crate::inode::Inode;

/// Mapping from inode number to shared inode, with a derived child lookup.
///
/// Child resolution has two sources: a direct `(parent, name) -> ino` index
/// maintained by the dispatcher as it learns about entries, and the parent
/// inode's cached directory snapshot. Both only ever produce an inode that
/// is present in the primary table; stale index rows are dropped on probe
/// instead of being returned.
pub struct InodeCache {
    /// ino -> inode mapping
    by_ino: DashMap<u64, Arc<Inode>>,
    /// (parent ino, entry name) -> child ino
    children: DashMap<(u64, String), u64>,
}

impl InodeCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            by_ino: DashMap::new(),
            children: DashMap::new(),
        }
    }

    /// Retrieve an inode by number.
    pub fn lookup(&self, ino: u64) -> Option<Arc<Inode>> {
        self.by_ino.get(&ino).map(|r| Arc::clone(&r))
    }

    /// Insert an inode if its number is not yet present. The existing entry
    /// always wins; attributes of a cached inode are never silently
    /// replaced by a fresh stat. Returns the inode that ended up cached.
    pub fn add(&self, inode: Arc<Inode>) -> Arc<Inode> {
        let ino = inode.ino().get();
        let winner = Arc::clone(
            self.by_ino
                .entry(ino)
                .or_insert_with(|| Arc::clone(&inode))
                .value(),
        );

        if !Arc::ptr_eq(&winner, &inode) {
            warn!(ino, "inode already cached, keeping the existing entry");
        }

        winner
    }

    /// Remove an inode. The inode's cached directory snapshot is detached
    /// here so the eviction breaks the inode -> handle -> child edge; the
    /// inode itself lives on until its last reference drops.
    pub fn remove(&self, ino: u64) -> Option<Arc<Inode>> {
        let (_, inode) = self.by_ino.remove(&ino)?;
        inode.detach_dir_handle();
        Some(inode)
    }

    /// Resolve a child by `(parent, name)`.
    ///
    /// Probes the direct index first, then the parent's cached directory
    /// snapshot. A resolved number that is no longer in the primary table
    /// is treated as a miss, never as a hit on stale data.
    pub fn lookup_child(&self, parent_ino: u64, name: &str) -> Option<Arc<Inode>> {
        let key = (parent_ino, name.to_string());

        if let Some(child_ino) = self.children.get(&key).map(|r| *r) {
            if let Some(inode) = self.lookup(child_ino) {
                return Some(inode);
            }
            // The child was evicted behind the index's back; drop the row.
            self.children.remove(&key);
        }

        let parent = self.lookup(parent_ino)?;
        let handle = parent.dir_handle()?;
        let child_ino = handle.child_ino(name)?;
        self.lookup(child_ino)
    }

    /// Record that `name` under `parent_ino` resolves to `child_ino`.
    pub fn index_child(&self, parent_ino: u64, name: &str, child_ino: u64) {
        self.children
            .insert((parent_ino, name.to_string()), child_ino);
    }

    /// Drop the index row for `name` under `parent_ino`, if any.
    pub fn unindex_child(&self, parent_ino: u64, name: &str) {
        self.children.remove(&(parent_ino, name.to_string()));
    }

    /// Whether `ino` is currently cached.
    pub fn contains(&self, ino: u64) -> bool {
        self.by_ino.contains_key(&ino)
    }

    /// Number of cached inodes.
    pub fn len(&self) -> usize {
        self.by_ino.len()
    }

    /// True when no inode is cached.
    pub fn is_empty(&self) -> bool {
        self.by_ino.is_empty()
    }
}

impl Default for InodeCache {
    fn default() -> Self {
        Self::new()
    }
}
