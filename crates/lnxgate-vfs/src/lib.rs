//! LNXGate VFS - asynchronous request-processing core
//!
//! Translates POSIX operations delivered by the kernel FUSE driver into
//! storage manager calls and local page-cache I/O:
//! - Inode cache with the kernel lookup-count eviction contract
//! - Directory snapshots and cached-file handles
//! - Direct descriptor I/O with AIO fallback for partial transfers
//! - Post-operation cache reconciliation (timestamps, link counts)

pub mod aio;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod inode;
pub mod inode_cache;

pub use aio::TokioAioEngine;
pub use dispatcher::Dispatcher;
pub use error::VfsError;
pub use handle::{DirEntry, DirHandle, FileHandle};
pub use inode::{Inode, InodeNumber};
pub use inode_cache::InodeCache;
