//! Asynchronous file I/O port (driven/secondary port)
//!
//! The event loop owns the machinery for non-blocking file I/O against the
//! local page-cache files; the VFS submits positioned reads and writes and
//! resumes when they complete. Short transfers are legal in both directions,
//! the read/write state machines in the VFS crate resubmit the remainder.

use std::io;
use std::os::unix::io::RawFd;

/// Positioned asynchronous I/O over raw file descriptors.
///
/// The descriptor stays owned by the submitting file handle; implementations
/// must not close it. Completions may be short: `read_at` may return fewer
/// than `len` bytes (zero means end of file) and `write_at` may accept fewer
/// than `buf.len()` bytes.
#[async_trait::async_trait]
pub trait IAioEngine: Send + Sync {
    /// Reads up to `len` bytes from `fd` at `offset`.
    async fn read_at(&self, fd: RawFd, len: usize, offset: u64) -> io::Result<Vec<u8>>;

    /// Writes `buf` to `fd` at `offset`, returning the number of bytes
    /// accepted.
    async fn write_at(&self, fd: RawFd, buf: &[u8], offset: u64) -> io::Result<usize>;

    /// Flushes `fd` to stable storage. `datasync` skips metadata, matching
    /// `fdatasync`.
    async fn fsync(&self, fd: RawFd, datasync: bool) -> io::Result<()>;
}
