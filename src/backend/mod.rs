//! Backend abstraction over the kernel submission/completion ring.
//!
//! The ring handle never talks to io_uring directly. It prepares a
//! [`SubmissionEntry`], pushes it into a [`Backend`], and later pops
//! [`RawCompletion`]s back out. This lets the library fall back to a
//! synchronous implementation where io_uring is unavailable (restricted
//! containers, seccomp profiles, older kernels) and lets tests script
//! completions.

use std::io;
use std::os::unix::io::RawFd;

use crate::config::BackendPreference;
use crate::error::{Result, UringFileError};
use crate::eventfd::EventFd;

pub mod fallback;
pub mod io_uring;

/// Kind-specific parameters of one submission queue entry.
///
/// Pointers reference memory owned by the ring's correlation table and
/// stay valid until the matching completion has been consumed.
#[derive(Debug, Clone, Copy)]
pub enum PreparedOp {
    /// `openat(dir_fd, path, flags, mode)`
    Open {
        /// Directory descriptor the path is resolved against
        dir_fd: RawFd,
        /// NUL-terminated path
        path: *const libc::c_char,
        /// `open(2)` flags
        flags: i32,
        /// Permission bits used when creating
        mode: u32,
    },
    /// `close(fd)`
    Close {
        /// Descriptor to close
        fd: RawFd,
    },
    /// `pread(fd, buf, len, offset)`
    Read {
        /// Descriptor to read from
        fd: RawFd,
        /// Destination buffer
        buf: *mut u8,
        /// Bytes requested
        len: u32,
        /// File offset
        offset: u64,
    },
    /// `pwrite(fd, buf, len, offset)`
    Write {
        /// Descriptor to write to
        fd: RawFd,
        /// Source buffer
        buf: *const u8,
        /// Bytes to write
        len: u32,
        /// File offset
        offset: u64,
    },
}

/// A prepared operation plus the correlation key echoed by its completion.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionEntry {
    /// Opaque correlation key
    pub user_data: u64,
    /// Operation parameters
    pub op: PreparedOp,
}

/// A completion copied out of the completion queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCompletion {
    /// Correlation key of the submission this completes
    pub user_data: u64,
    /// Raw result: negative errno on failure
    pub result: i32,
}

/// Trait for ring backends that execute submitted entries.
///
/// # Safety
///
/// Implementations must not access the memory referenced by a pushed entry
/// after the corresponding completion has been returned from
/// [`Backend::next_completion`].
pub trait Backend: Send {
    /// Get backend name for debugging.
    fn name(&self) -> &'static str;

    /// Maximum number of entries that can be queued before [`Backend::submit`].
    fn capacity(&self) -> u32;

    /// Queue an entry in the submission queue.
    ///
    /// Returns [`UringFileError::QueueExhausted`] when no slot is free. A
    /// failed push leaves no trace in the backend.
    ///
    /// # Safety
    ///
    /// Every pointer in `entry` must stay valid until the entry's completion
    /// has been returned by [`Backend::next_completion`].
    unsafe fn push(&mut self, entry: &SubmissionEntry) -> Result<()>;

    /// Hand all queued entries to the kernel. Returns how many were submitted.
    fn submit(&mut self) -> Result<usize>;

    /// Pop the next available completion, marking its slot seen.
    ///
    /// `None` means the completion queue is empty right now.
    fn next_completion(&mut self) -> Option<RawCompletion>;

    /// Block until at least one completion is available.
    fn wait_for_completion(&mut self) -> Result<()>;

    /// Signal `event_fd` whenever a completion is posted.
    fn register_eventfd(&mut self, event_fd: &EventFd) -> Result<()>;

    /// Stop signalling the registered eventfd.
    fn unregister_eventfd(&mut self) -> Result<()>;
}

/// Factory used by the ring to create its backend lazily.
pub type BackendFactory = dyn Fn(u32) -> Result<Box<dyn Backend>> + Send + Sync;

/// Create the backend selected by `preference`.
///
/// [`BackendPreference::Auto`] tries io_uring first and falls back to the
/// synchronous backend when the kernel refuses to create a ring.
pub fn detect_backend(entries: u32, preference: BackendPreference) -> Result<Box<dyn Backend>> {
    if entries == 0 {
        return Err(UringFileError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Queue depth must be greater than 0",
        )));
    }

    match preference {
        BackendPreference::IoUring => Ok(Box::new(io_uring::IoUringBackend::new(entries)?)),
        BackendPreference::Fallback => Ok(Box::new(fallback::FallbackBackend::new(entries))),
        BackendPreference::Auto => match io_uring::IoUringBackend::new(entries) {
            Ok(backend) => Ok(Box::new(backend)),
            Err(e) => {
                tracing::warn!(error = %e, "io_uring unavailable, using synchronous fallback");
                Ok(Box::new(fallback::FallbackBackend::new(entries)))
            }
        },
    }
}

/// Check if io_uring is available in the current environment.
pub fn is_io_uring_available() -> bool {
    io_uring::IoUringBackend::new(1).is_ok()
}
