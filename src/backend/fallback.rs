//! Synchronous fallback backend implementation.
//!
//! This backend provides a fallback mechanism for environments where io_uring
//! is not available, such as older kernels, containers with restricted
//! capabilities, or sandboxes that block the io_uring syscalls.
//!
//! Each entry is executed with the equivalent blocking syscall when it is
//! pushed. The raw result is staged and only becomes visible as a completion
//! after [`Backend::submit`], which also signals the registered eventfd, so
//! the ring observes the same push / submit / complete sequence either way.

use std::collections::VecDeque;
use std::io;

use crate::backend::{Backend, PreparedOp, RawCompletion, SubmissionEntry};
use crate::error::{Result, UringFileError};
use crate::eventfd::EventFd;

/// Fallback backend executing operations with plain syscalls.
#[derive(Debug)]
pub struct FallbackBackend {
    entries: u32,
    staged: VecDeque<RawCompletion>,
    completed: VecDeque<RawCompletion>,
    event_fd: Option<EventFd>,
}

impl FallbackBackend {
    /// Create a fallback backend accepting `entries` unsubmitted operations.
    pub fn new(entries: u32) -> Self {
        Self {
            entries,
            staged: VecDeque::new(),
            completed: VecDeque::new(),
            event_fd: None,
        }
    }

    /// Execute a single operation, returning a completion-style result.
    ///
    /// # Safety
    ///
    /// Pointers in `op` must be valid for the duration of the call.
    unsafe fn execute(op: &PreparedOp) -> i32 {
        let ret: isize = match *op {
            PreparedOp::Open {
                dir_fd,
                path,
                flags,
                mode,
            } => unsafe { libc::openat(dir_fd, path, flags, mode) as isize },
            PreparedOp::Close { fd } => unsafe { libc::close(fd) as isize },
            PreparedOp::Read {
                fd,
                buf,
                len,
                offset,
            } => unsafe {
                libc::pread(
                    fd,
                    buf as *mut libc::c_void,
                    len as usize,
                    offset as libc::off_t,
                )
            },
            PreparedOp::Write {
                fd,
                buf,
                len,
                offset,
            } => unsafe {
                libc::pwrite(
                    fd,
                    buf as *const libc::c_void,
                    len as usize,
                    offset as libc::off_t,
                )
            },
        };

        if ret < 0 {
            -io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
        } else {
            // Transfers are bounded by a u32 length, results fit an i32 the
            // same way io_uring completions do.
            ret.min(i32::MAX as isize) as i32
        }
    }

    fn signal(&self) -> Result<()> {
        if let Some(event_fd) = &self.event_fd {
            event_fd.signal()?;
        }
        Ok(())
    }
}

impl Backend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn capacity(&self) -> u32 {
        self.entries
    }

    unsafe fn push(&mut self, entry: &SubmissionEntry) -> Result<()> {
        if self.staged.len() >= self.entries as usize {
            return Err(UringFileError::QueueExhausted {
                capacity: self.entries,
            });
        }

        // SAFETY: the caller keeps every pointer valid until completion,
        // which includes this synchronous call.
        let result = unsafe { Self::execute(&entry.op) };
        self.staged.push_back(RawCompletion {
            user_data: entry.user_data,
            result,
        });
        Ok(())
    }

    fn submit(&mut self) -> Result<usize> {
        let submitted = self.staged.len();
        if submitted == 0 {
            return Ok(0);
        }
        self.completed.extend(self.staged.drain(..));
        self.signal()?;
        Ok(submitted)
    }

    fn next_completion(&mut self) -> Option<RawCompletion> {
        self.completed.pop_front()
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        if self.completed.is_empty() {
            self.submit()?;
        }
        if self.completed.is_empty() {
            return Err(UringFileError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "No operations to wait for",
            )));
        }
        Ok(())
    }

    fn register_eventfd(&mut self, event_fd: &EventFd) -> Result<()> {
        self.event_fd = Some(event_fd.clone());
        Ok(())
    }

    fn unregister_eventfd(&mut self) -> Result<()> {
        self.event_fd = None;
        Ok(())
    }
}
