//! Correlation table for in-flight operations.

use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::io::RawFd;

use crate::error::{Result, UringFileError};
use crate::future::{OperationCompleter, Outcome};
use crate::operation::OperationKind;

/// Tracks in-flight operations by the user_data the kernel echoes back.
///
/// Each entry owns whatever memory the kernel may touch while the operation
/// is in flight, so buffers stay valid even if the awaiting caller gives up.
#[derive(Debug)]
pub(crate) struct OperationTracker {
    in_flight: HashMap<u64, InFlight>,
    next_id: u64,
}

/// Memory the kernel reads from or writes into until completion.
#[derive(Debug)]
pub(crate) enum Auxiliary {
    /// Nothing to keep alive (CLOSE)
    None,
    /// NUL-terminated absolute path handed to `openat` (OPEN)
    Path(CString),
    /// Destination buffer filled by the kernel (READ)
    ReadBuffer(Vec<u8>),
    /// Source bytes consumed by the kernel (WRITE)
    WriteBuffer(Vec<u8>),
}

impl Auxiliary {
    /// Address of the kernel-visible bytes, null when there are none.
    ///
    /// Heap storage does not move when the owning value moves, so the
    /// pointer stays valid after the auxiliary is stored in the tracker.
    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Self::None => std::ptr::null_mut(),
            Self::Path(path) => path.as_ptr() as *mut u8,
            Self::ReadBuffer(buffer) | Self::WriteBuffer(buffer) => buffer.as_mut_ptr(),
        }
    }

    /// Number of kernel-visible bytes (path length excludes the NUL).
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Path(path) => path.as_bytes().len(),
            Self::ReadBuffer(buffer) | Self::WriteBuffer(buffer) => buffer.len(),
        }
    }
}

/// Correlation entry for one submitted operation.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub(crate) kind: OperationKind,
    pub(crate) fd: RawFd,
    completer: OperationCompleter,
    auxiliary: Auxiliary,
}

impl InFlight {
    pub(crate) fn new(
        kind: OperationKind,
        fd: RawFd,
        completer: OperationCompleter,
        auxiliary: Auxiliary,
    ) -> Self {
        Self {
            kind,
            fd,
            completer,
            auxiliary,
        }
    }

    /// Interpret a raw completion result for this entry's kind.
    ///
    /// Negative codes become [`UringFileError::KernelOperationFailed`].
    pub(crate) fn interpret(kind: OperationKind, auxiliary: Auxiliary, res: i32) -> Result<Outcome> {
        if res < 0 {
            return Err(UringFileError::KernelOperationFailed {
                op: kind,
                code: -res,
            });
        }

        let transferred = res as usize;
        match (kind, auxiliary) {
            (OperationKind::Open, _) => Ok(Outcome::Opened(res)),
            (OperationKind::Close, _) => Ok(Outcome::Closed),
            (OperationKind::Read, Auxiliary::ReadBuffer(mut buffer)) => {
                buffer.truncate(transferred);
                Ok(Outcome::Read(buffer))
            }
            (OperationKind::Read, _) => Ok(Outcome::Read(Vec::new())),
            (OperationKind::Write, _) => Ok(Outcome::Written(transferred)),
        }
    }

    /// Resolve the awaiting token with the completion result.
    pub(crate) fn resolve(self, res: i32) {
        let outcome = Self::interpret(self.kind, self.auxiliary, res);
        self.completer.complete(outcome);
    }

    /// Give up on an operation whose completion will never be consumed.
    ///
    /// The kernel may still be writing into the buffer, so its memory is
    /// leaked instead of freed. The token resolves with
    /// [`UringFileError::RingShutdown`].
    pub(crate) fn abandon(self) {
        let Self {
            completer,
            auxiliary,
            ..
        } = self;
        std::mem::forget(auxiliary);
        completer.complete(Err(UringFileError::RingShutdown));
    }

    /// Returns true if nobody is awaiting this operation any more.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.completer.is_abandoned()
    }
}

impl OperationTracker {
    /// Create a new, empty tracker.
    pub(crate) fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            next_id: 1, // Start from 1, reserve 0 for special cases
        }
    }

    /// Reserve a correlation ID not currently in flight.
    pub(crate) fn reserve_id(&mut self) -> u64 {
        loop {
            let id = self.next_id;
            // Wrapping add prevents overflow panics in long-running applications
            self.next_id = self.next_id.wrapping_add(1);
            if id != 0 && !self.in_flight.contains_key(&id) {
                return id;
            }
        }
    }

    /// Record an operation under a previously reserved ID.
    pub(crate) fn insert(&mut self, id: u64, entry: InFlight) {
        let previous = self.in_flight.insert(id, entry);
        debug_assert!(previous.is_none(), "correlation id {id} reused while in flight");
    }

    /// Remove and return the entry for a consumed completion.
    pub(crate) fn complete_operation(&mut self, id: u64) -> Option<InFlight> {
        self.in_flight.remove(&id)
    }

    /// Check if an operation is currently tracked.
    #[cfg(test)]
    pub(crate) fn is_operation_tracked(&self, id: u64) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Get the number of operations currently in flight.
    pub(crate) fn count(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if there are any operations in flight.
    pub(crate) fn has_operations(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Remove every entry, leaving the tracker empty.
    pub(crate) fn drain(&mut self) -> Vec<InFlight> {
        self.in_flight.drain().map(|(_, entry)| entry).collect()
    }

    /// Get debug information about all in-flight operations.
    pub(crate) fn debug_info(&self) -> Vec<(u64, OperationKind, RawFd)> {
        self.in_flight
            .iter()
            .map(|(id, entry)| (*id, entry.kind, entry.fd))
            .collect()
    }
}

impl Default for OperationTracker {
    fn default() -> Self {
        Self::new()
    }
}
