//! Asynchronous I/O resumption for partially completed reads and writes.
//!
//! The dispatcher first attempts a direct positioned syscall on the cached
//! file; when that only makes partial progress the remainder is driven
//! through the event loop's AIO facility until the transfer completes or
//! hits end of file. `TokioAioEngine` is the production engine; tests
//! substitute their own to exercise the resumption paths.

use std::{io, os::unix::io::RawFd};

use lnxgate_core::ports::IAioEngine;
use tracing::error;

use crate::error::VfsError;

/// AIO engine backed by the tokio blocking pool.
///
/// Positioned reads and writes run as `pread`/`pwrite` on the blocking
/// pool so the event loop never stalls on page-cache misses.
pub struct TokioAioEngine;

fn join_error(err: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

#[async_trait::async_trait]
impl IAioEngine for TokioAioEngine {
    async fn read_at(&self, fd: RawFd, len: usize, offset: u64) -> io::Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            let got = unsafe {
                libc::pread(
                    fd,
                    buf.as_mut_ptr() as *mut libc::c_void,
                    len,
                    offset as libc::off_t,
                )
            };
            if got < 0 {
                return Err(io::Error::last_os_error());
            }
            buf.truncate(got as usize);
            Ok(buf)
        })
        .await
        .map_err(join_error)?
    }

    async fn write_at(&self, fd: RawFd, buf: &[u8], offset: u64) -> io::Result<usize> {
        let owned = buf.to_vec();
        tokio::task::spawn_blocking(move || {
            let written = unsafe {
                libc::pwrite(
                    fd,
                    owned.as_ptr() as *const libc::c_void,
                    owned.len(),
                    offset as libc::off_t,
                )
            };
            if written < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(written as usize)
        })
        .await
        .map_err(join_error)?
    }

    async fn fsync(&self, fd: RawFd, datasync: bool) -> io::Result<()> {
        tokio::task::spawn_blocking(move || {
            let rc = if datasync {
                unsafe { libc::fdatasync(fd) }
            } else {
                unsafe { libc::fsync(fd) }
            };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        })
        .await
        .map_err(join_error)?
    }
}

/// Drives a partially completed read to its terminal state.
///
/// `buf` holds `got` valid bytes of a `size`-byte request starting at
/// `offset`. Each completion accumulates; the transfer ends when the buffer
/// is full or a zero-length completion signals end of file. The returned
/// buffer is truncated to the bytes actually read.
pub(crate) async fn run_read(
    aio: &dyn IAioEngine,
    fd: RawFd,
    mut buf: Vec<u8>,
    offset: u64,
    mut got: usize,
) -> Result<Vec<u8>, VfsError> {
    let size = buf.len();

    loop {
        debug_assert!(got < size);

        let chunk = aio
            .read_at(fd, size - got, offset + got as u64)
            .await
            .map_err(|err| {
                error!(fd, offset, got, error = %err, "AIO read failed");
                VfsError::Io(err)
            })?;

        let new_got = chunk.len();
        let total = got.checked_add(new_got).ok_or(VfsError::Overflow)?;
        if total > size {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "AIO engine returned more bytes than requested",
            )));
        }

        buf[got..total].copy_from_slice(&chunk);
        got = total;

        // A zero-length completion means end of file.
        if got == size || new_got == 0 {
            buf.truncate(got);
            return Ok(buf);
        }
    }
}

/// Drives a partially completed write to its terminal state.
///
/// `done` bytes of `buf` were already accepted; each completion accumulates
/// until the whole buffer has been written. Returns the total byte count.
pub(crate) async fn run_write(
    aio: &dyn IAioEngine,
    fd: RawFd,
    buf: &[u8],
    offset: u64,
    mut done: usize,
) -> Result<usize, VfsError> {
    loop {
        debug_assert!(done < buf.len());

        let accepted = aio
            .write_at(fd, &buf[done..], offset + done as u64)
            .await
            .map_err(|err| {
                error!(fd, offset, done, error = %err, "AIO write failed");
                VfsError::Io(err)
            })?;

        if accepted == 0 {
            return Err(VfsError::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "AIO engine accepted no bytes",
            )));
        }

        done = done.checked_add(accepted).ok_or(VfsError::Overflow)?;
        if done >= buf.len() {
            return Ok(done);
        }
    }
}
