//! LNXGate Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core for the LNXGate
//! filesystem gateway:
//! - **Domain types** - `RemoteAttr`, `DirListing`, `SetAttrRequest`, `FsStats`
//! - **Port definitions** - Traits for adapters: `IStorageManager`, `IAioEngine`
//! - **Configuration** - `VfsConfig`
//!
//! # Architecture
//!
//! The gateway exposes a remote object store as a POSIX filesystem. The
//! domain module contains pure data types with no external dependencies.
//! Ports define trait interfaces that adapter crates implement: the storage
//! manager client (an out-of-process daemon translating filesystem calls to
//! object-store operations) and the event loop's asynchronous file I/O
//! facility. The `lnxgate-vfs` crate orchestrates these ports.

pub mod config;
pub mod domain;
pub mod ports;
