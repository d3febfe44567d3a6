//! Error types and handling for uring-file operations.
//!
//! Every failure the ring or a [`File`](crate::File) can report is a variant
//! of [`UringFileError`]. Kernel-reported failures keep their raw errno so the
//! awaiting caller can inspect exactly what the kernel said.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::operation::OperationKind;

/// Result type alias for uring-file operations.
pub type Result<T> = std::result::Result<T, UringFileError>;

/// Error type for uring-file operations.
///
/// # Design Notes
///
/// - Uses `thiserror` for the `Error` trait implementation
/// - `std::io::Error` converts automatically via `#[from]`
/// - All variants are `Send + Sync` for use in async contexts
#[derive(Debug, Error)]
pub enum UringFileError {
    /// No free submission queue slot.
    ///
    /// The ring never retries or waits for space; the caller decides
    /// whether to back off and resubmit.
    #[error("Submission queue exhausted (capacity {capacity})")]
    QueueExhausted {
        /// Submission queue capacity of the ring
        capacity: u32,
    },

    /// The kernel completed the operation with a negative result code.
    #[error("{op} operation failed: {}", describe_errno(.code))]
    KernelOperationFailed {
        /// Kind of operation that failed
        op: OperationKind,
        /// Positive errno reported by the kernel
        code: i32,
    },

    /// A completion referenced a correlation ID the ring does not know.
    ///
    /// This means ring state is corrupt. The dispatcher aborts the ring
    /// when it sees this.
    #[error("Completion for unknown operation id {user_data}")]
    ProtocolViolation {
        /// The user_data echoed by the completion
        user_data: u64,
    },

    /// `open` was called on a file that already holds a descriptor.
    #[error("File {} is already open", .path.display())]
    AlreadyOpen {
        /// Path of the file handle
        path: PathBuf,
    },

    /// An operation that needs a descriptor was called on a closed file.
    #[error("File {} is not open", .path.display())]
    NotOpen {
        /// Path of the file handle
        path: PathBuf,
    },

    /// The first submission happened outside a tokio runtime.
    #[error("Ring setup requires a running tokio runtime")]
    NoRuntime,

    /// The operation was abandoned because its ring was torn down.
    #[error("Ring was shut down before the operation completed")]
    RingShutdown,

    /// A thread panicked while holding the ring state lock.
    #[error("Ring state mutex is poisoned")]
    RingPoisoned,

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl UringFileError {
    /// Raw OS error code, if this error carries one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::KernelOperationFailed { code, .. } => Some(*code),
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Convert a kernel failure into the equivalent `std::io::Error`.
    ///
    /// Returns `None` for variants that did not come from the OS.
    pub fn as_io_error(&self) -> Option<io::Error> {
        self.raw_os_error().map(io::Error::from_raw_os_error)
    }
}

fn describe_errno(code: &i32) -> io::Error {
    io::Error::from_raw_os_error(*code)
}

static_assertions::assert_impl_all!(UringFileError: Send, Sync);
