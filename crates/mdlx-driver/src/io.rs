//! Low-level I/O over one MBPU character device.
//!
//! The device moves whole frames and whole registers or nothing; a transfer
//! that comes back short means the XDMA channel is wedged, so short I/O is
//! surfaced as an error rather than retried.

use rustix::fd::BorrowedFd;
use rustix::io::{pread, pwrite, read, write};
use std::os::unix::io::RawFd;

use crate::error::{MdlxError, Result};

/// Exact-size I/O operations over one file descriptor.
///
/// Does not own the descriptor; the owning device keeps it open for as long
/// as any handle exists.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoHandle {
    fd: RawFd,
    node: &'static str,
}

impl IoHandle {
    pub(crate) const fn new(fd: RawFd, node: &'static str) -> Self {
        Self { fd, node }
    }

    fn fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the owning MdlxDevice keeps fd open for the handle's lifetime
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }

    /// Write the whole buffer in one transfer.
    pub(crate) fn write_all(&self, data: &[u8]) -> Result<()> {
        let got = write(self.fd(), data).map_err(|e| MdlxError::Io { source: e.into() })?;
        if got != data.len() {
            return Err(MdlxError::ShortIo {
                op: "write",
                node: self.node,
                expected: data.len(),
                got,
            });
        }
        Ok(())
    }

    /// Fill the whole buffer in one transfer.
    pub(crate) fn read_exact(&self, buf: &mut [u8]) -> Result<()> {
        let got = read(self.fd(), buf).map_err(|e| MdlxError::Io { source: e.into() })?;
        if got != buf.len() {
            return Err(MdlxError::ShortIo {
                op: "read",
                node: self.node,
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Positioned register read.
    pub(crate) fn pread_exact(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        let got = pread(self.fd(), buf, offset).map_err(|e| MdlxError::Io { source: e.into() })?;
        if got != buf.len() {
            return Err(MdlxError::ShortIo {
                op: "pread",
                node: self.node,
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Positioned register write.
    pub(crate) fn pwrite_all(&self, data: &[u8], offset: u64) -> Result<()> {
        let got = pwrite(self.fd(), data, offset).map_err(|e| MdlxError::Io { source: e.into() })?;
        if got != data.len() {
            return Err(MdlxError::ShortIo {
                op: "pwrite",
                node: self.node,
                expected: data.len(),
                got,
            });
        }
        Ok(())
    }
}
