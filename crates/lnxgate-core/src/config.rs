//! Configuration module for the LNXGate VFS core.
//!
//! Provides the typed configuration struct consumed by the dispatcher, with
//! defaults and validation.

use serde::{Deserialize, Serialize};

/// VFS core configuration.
///
/// These knobs tune the dispatcher's interaction with the kernel driver and
/// the storage manager. They map to the `vfs` section of the gateway's
/// configuration file; loading that file is the daemon's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VfsConfig {
    /// Seconds the kernel may cache file attributes before re-querying.
    pub attr_ttl_secs: u64,
    /// Seconds the kernel may cache name lookups before re-querying.
    pub entry_ttl_secs: u64,
    /// Minimum seconds between write notifications sent to the storage
    /// manager for the same inode. Writes landing inside the window only
    /// mark the handle dirty; the notification is sent with the next write
    /// outside it (or with fsync/release).
    pub dirty_notify_interval_secs: u64,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            attr_ttl_secs: 1,
            entry_ttl_secs: 1,
            dirty_notify_interval_secs: 30,
        }
    }
}

impl VfsConfig {
    /// Validates the configuration values.
    ///
    /// Returns a human-readable description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.dirty_notify_interval_secs == 0 {
            return Err("dirty_notify_interval_secs must be at least 1".to_string());
        }

        Ok(())
    }
}
