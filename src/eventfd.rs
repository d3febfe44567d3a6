//! Non-blocking eventfd used as the ring's completion doorbell.

use std::fmt;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::sync::Arc;

use nix::errno::Errno;
use nix::sys::eventfd::{self, EfdFlags};

/// Shared handle to an eventfd created with `EFD_NONBLOCK | EFD_CLOEXEC`.
///
/// Whoever posts completions adds to the counter; the dispatcher reads it,
/// which returns the accumulated count and resets it, so several
/// completions coalesce into a single wakeup. Clones refer to the same
/// counter and the descriptor is closed with the last clone.
#[derive(Clone)]
pub struct EventFd {
    inner: Arc<eventfd::EventFd>,
}

impl EventFd {
    /// Create a new eventfd with a zero counter.
    pub(crate) fn new() -> io::Result<Self> {
        let fd = eventfd::EventFd::from_value_and_flags(
            0,
            EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC,
        )?;
        Ok(Self {
            inner: Arc::new(fd),
        })
    }

    /// Read and reset the counter.
    ///
    /// Fails with `WouldBlock` when the counter is zero.
    pub fn read(&self) -> io::Result<u64> {
        Ok(self.inner.read()?)
    }

    /// Add one to the counter, waking the reader.
    ///
    /// A saturated counter already has a wakeup pending, so `EAGAIN` is
    /// not an error.
    pub fn signal(&self) -> io::Result<()> {
        match self.inner.write(1) {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl AsFd for EventFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for EventFd {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_fd().as_raw_fd()
    }
}

impl fmt::Debug for EventFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFd")
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}
