//! Domain error types
//!
//! Validation failures for port-level DTOs. Operational errors live with the
//! ports (`StorageError`) and the VFS crate (`VfsError`).

use thiserror::Error;

/// Errors that can occur validating domain data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Inode numbers are strictly positive.
    #[error("Invalid inode number: {0}")]
    InvalidInodeNumber(u64),
}
