//! Error types for the VFS core.
//!
//! Defines `VfsError` and conversions to libc errno values.

use lnxgate_core::ports::StorageError;
use thiserror::Error;

/// Errors surfaced to the kernel driver by dispatcher operations.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("name too long: {0}")]
    NameTooLong(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("accumulated transfer size overflow")]
    Overflow,

    #[error("out of memory")]
    OutOfMemory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage manager error (errno {0})")]
    Backend(i32),
}

impl VfsError {
    /// True for failures that are part of normal operation and should be
    /// logged quietly (a shell probing names, a non-empty rename target).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            VfsError::NotFound(_) | VfsError::NameTooLong(_) | VfsError::NotEmpty(_)
        )
    }

    /// POSIX errno equivalent, as replied to the kernel.
    pub fn errno(&self) -> libc::c_int {
        match self {
            VfsError::NotFound(_) => libc::ENOENT,
            VfsError::NotADirectory(_) => libc::ENOTDIR,
            VfsError::IsADirectory(_) => libc::EISDIR,
            VfsError::NameTooLong(_) => libc::ENAMETOOLONG,
            VfsError::NotEmpty(_) => libc::ENOTEMPTY,
            VfsError::InvalidArgument(_) => libc::EINVAL,
            VfsError::Overflow => libc::E2BIG,
            VfsError::OutOfMemory => libc::ENOMEM,
            VfsError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            VfsError::Backend(errno) => *errno,
        }
    }
}

impl From<VfsError> for libc::c_int {
    fn from(err: VfsError) -> libc::c_int {
        err.errno()
    }
}

impl From<StorageError> for VfsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => VfsError::NotFound("remote entry".to_string()),
            StorageError::NotADirectory => VfsError::NotADirectory("remote entry".to_string()),
            StorageError::IsADirectory => VfsError::IsADirectory("remote entry".to_string()),
            StorageError::NameTooLong => VfsError::NameTooLong("remote entry".to_string()),
            StorageError::NotEmpty => VfsError::NotEmpty("remote entry".to_string()),
            StorageError::Io(io) => VfsError::Io(io),
            StorageError::Errno(errno) if errno == libc::ENOMEM => VfsError::OutOfMemory,
            StorageError::Errno(errno) => VfsError::Backend(errno),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(VfsError::NotFound("x".into()).errno(), libc::ENOENT);
        assert_eq!(VfsError::NotADirectory("x".into()).errno(), libc::ENOTDIR);
        assert_eq!(VfsError::IsADirectory("x".into()).errno(), libc::EISDIR);
        assert_eq!(VfsError::NameTooLong("x".into()).errno(), libc::ENAMETOOLONG);
        assert_eq!(VfsError::NotEmpty("x".into()).errno(), libc::ENOTEMPTY);
        assert_eq!(VfsError::InvalidArgument("x".into()).errno(), libc::EINVAL);
        assert_eq!(VfsError::Overflow.errno(), libc::E2BIG);
        assert_eq!(VfsError::OutOfMemory.errno(), libc::ENOMEM);
        assert_eq!(VfsError::Backend(libc::EROFS).errno(), libc::EROFS);
    }

    #[test]
    fn test_io_errno_passthrough() {
        let err = VfsError::Io(std::io::Error::from_raw_os_error(libc::ENOSPC));
        assert_eq!(err.errno(), libc::ENOSPC);

        let err = VfsError::Io(std::io::Error::new(std::io::ErrorKind::Other, "opaque"));
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn test_storage_error_conversion() {
        assert_eq!(
            VfsError::from(StorageError::NotEmpty).errno(),
            libc::ENOTEMPTY
        );
        assert_eq!(
            VfsError::from(StorageError::Errno(libc::ENOMEM)).errno(),
            libc::ENOMEM
        );
        assert_eq!(
            VfsError::from(StorageError::Errno(libc::EACCES)).errno(),
            libc::EACCES
        );
    }

    #[test]
    fn test_expected_errors() {
        assert!(VfsError::NameTooLong("x".into()).is_expected());
        assert!(VfsError::NotEmpty("x".into()).is_expected());
        assert!(!VfsError::Overflow.is_expected());
    }
}
