//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! VFS core. Ports are interfaces the core depends on, but whose
//! implementations live in adapter crates or in the surrounding daemon.
//!
//! ## Ports Overview
//!
//! - [`IStorageManager`] - The out-of-process storage manager client that
//!   translates filesystem operations into remote object-store operations.
//! - [`IAioEngine`] - The event loop's asynchronous file I/O facility used
//!   for reads and writes against local page-cache files.

pub mod aio;
pub mod storage_manager;

pub use aio::IAioEngine;
pub use storage_manager::{IStorageManager, RenameOutcome, StorageError, StorageResult};
