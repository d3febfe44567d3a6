//! io_uring backend implementation.

use std::io;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

use crate::backend::{Backend, RawCompletion, SubmissionEntry};
use crate::error::{Result, UringFileError};
use crate::eventfd::EventFd;

#[cfg(target_os = "linux")]
use crate::backend::PreparedOp;
#[cfg(target_os = "linux")]
use io_uring::{opcode, squeue, types, IoUring, Probe};

/// Opcodes every file operation relies on.
#[cfg(target_os = "linux")]
const REQUIRED_OPCODES: [(u8, &str); 4] = [
    (opcode::OpenAt::CODE, "openat"),
    (opcode::Close::CODE, "close"),
    (opcode::Read::CODE, "read"),
    (opcode::Write::CODE, "write"),
];

#[cfg(target_os = "linux")]
fn missing_opcodes(is_supported: impl Fn(u8) -> bool) -> Vec<&'static str> {
    REQUIRED_OPCODES
        .iter()
        .filter(|(code, _)| !is_supported(*code))
        .map(|&(_, name)| name)
        .collect()
}

/// Kernel io_uring instance plus its submission and completion queues.
#[cfg(target_os = "linux")]
pub struct IoUringBackend {
    ring: IoUring,
}

#[cfg(target_os = "linux")]
impl IoUringBackend {
    /// Create a new io_uring backend with `entries` submission slots.
    ///
    /// Fails when the kernel can create a ring but lacks one of the file
    /// opcodes (kernels before 5.6), so callers can fall back.
    pub fn new(entries: u32) -> Result<Self> {
        let ring = IoUring::new(entries)?;

        let mut probe = Probe::new();
        let missing = match ring.submitter().register_probe(&mut probe) {
            Ok(()) => missing_opcodes(|code| probe.is_supported(code)),
            // Probing itself arrived in 5.6, together with OPENAT.
            Err(_) => missing_opcodes(|_| false),
        };
        if !missing.is_empty() {
            return Err(UringFileError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("io_uring lacks required opcodes: {}", missing.join(", ")),
            )));
        }

        tracing::debug!(
            sq_entries = ring.params().sq_entries(),
            cq_entries = ring.params().cq_entries(),
            "io_uring instance created"
        );
        Ok(Self { ring })
    }

    fn pop(&mut self) -> Option<RawCompletion> {
        // Dropping the completion view publishes the new head, which marks
        // the popped entry as seen.
        let mut cq = self.ring.completion();
        cq.next().map(|cqe| RawCompletion {
            user_data: cqe.user_data(),
            result: cqe.result(),
        })
    }

    fn build(entry: &SubmissionEntry) -> squeue::Entry {
        let sqe = match entry.op {
            PreparedOp::Open {
                dir_fd,
                path,
                flags,
                mode,
            } => opcode::OpenAt::new(types::Fd(dir_fd), path)
                .flags(flags)
                .mode(mode)
                .build(),
            PreparedOp::Close { fd } => opcode::Close::new(types::Fd(fd)).build(),
            PreparedOp::Read {
                fd,
                buf,
                len,
                offset,
            } => opcode::Read::new(types::Fd(fd), buf, len)
                .offset(offset)
                .build(),
            PreparedOp::Write {
                fd,
                buf,
                len,
                offset,
            } => opcode::Write::new(types::Fd(fd), buf, len)
                .offset(offset)
                .build(),
        };
        sqe.user_data(entry.user_data)
    }
}

#[cfg(target_os = "linux")]
impl Backend for IoUringBackend {
    fn name(&self) -> &'static str {
        "io_uring"
    }

    fn capacity(&self) -> u32 {
        self.ring.params().sq_entries()
    }

    unsafe fn push(&mut self, entry: &SubmissionEntry) -> Result<()> {
        let sqe = Self::build(entry);
        let capacity = self.capacity();
        // SAFETY: the caller guarantees every pointer in the entry outlives
        // its completion.
        let pushed = unsafe { self.ring.submission().push(&sqe) };
        pushed.map_err(|_| UringFileError::QueueExhausted { capacity })
    }

    fn submit(&mut self) -> Result<usize> {
        Ok(self.ring.submit()?)
    }

    fn next_completion(&mut self) -> Option<RawCompletion> {
        if let Some(completion) = self.pop() {
            return Some(completion);
        }

        // Completions beyond the CQ size sit on the kernel's overflow list
        // until an io_uring_enter with GETEVENTS, which `submit` issues
        // while the overflow flag is raised.
        if !self.ring.submission().cq_overflow() {
            return None;
        }
        match self.ring.submit() {
            Ok(_) => tracing::trace!("flushed overflowed completions"),
            Err(e) => tracing::warn!(error = %e, "failed to flush overflowed completions"),
        }
        self.pop()
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        loop {
            match self.ring.submit_and_wait(1) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn register_eventfd(&mut self, event_fd: &EventFd) -> Result<()> {
        self.ring.submitter().register_eventfd(event_fd.as_raw_fd())?;
        Ok(())
    }

    fn unregister_eventfd(&mut self) -> Result<()> {
        self.ring.submitter().unregister_eventfd()?;
        Ok(())
    }
}

/// Stub implementation for non-Linux platforms
#[cfg(not(target_os = "linux"))]
pub struct IoUringBackend;

#[cfg(not(target_os = "linux"))]
fn unsupported() -> UringFileError {
    UringFileError::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "io_uring is only supported on Linux",
    ))
}

#[cfg(not(target_os = "linux"))]
impl IoUringBackend {
    /// Create a new io_uring backend (stub for non-Linux platforms).
    pub fn new(_entries: u32) -> Result<Self> {
        Err(unsupported())
    }
}

#[cfg(not(target_os = "linux"))]
impl Backend for IoUringBackend {
    fn name(&self) -> &'static str {
        "io_uring (unsupported)"
    }

    fn capacity(&self) -> u32 {
        0
    }

    unsafe fn push(&mut self, _entry: &SubmissionEntry) -> Result<()> {
        Err(unsupported())
    }

    fn submit(&mut self) -> Result<usize> {
        Err(unsupported())
    }

    fn next_completion(&mut self) -> Option<RawCompletion> {
        None
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        Err(unsupported())
    }

    fn register_eventfd(&mut self, _event_fd: &EventFd) -> Result<()> {
        Err(unsupported())
    }

    fn unregister_eventfd(&mut self) -> Result<()> {
        Err(unsupported())
    }
}
