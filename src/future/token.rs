//! Single-assignment result tokens for submitted operations.
//!
//! Submitting an operation creates a linked [`OperationToken`] /
//! [`OperationCompleter`] pair. The token goes back to the caller and is
//! awaited; the completer is stored in the ring's correlation table and is
//! consumed by the completion dispatcher. Either side may disappear first:
//!
//! - a dropped token makes the eventual resolution a no-op (the value is
//!   dropped with the shared slot), so the table entry is still removed;
//! - a dropped, unresolved completer resolves the token with
//!   [`UringFileError::RingShutdown`], so no waiter hangs forever.

use std::future::Future;
use std::marker::PhantomData;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::error::{Result, UringFileError};

/// Typed value produced by a successful completion.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// OPEN completed with this descriptor
    Opened(RawFd),
    /// CLOSE completed
    Closed,
    /// READ completed; the buffer holds exactly the transferred bytes
    Read(Vec<u8>),
    /// WRITE completed after transferring this many bytes
    Written(usize),
}

/// Conversion from a dispatcher [`Outcome`] to a token's output type.
pub trait FromOutcome: Sized {
    /// Extract the value, failing on a kind mismatch.
    fn from_outcome(outcome: Outcome) -> Result<Self>;
}

impl FromOutcome for Outcome {
    fn from_outcome(outcome: Outcome) -> Result<Self> {
        Ok(outcome)
    }
}

impl FromOutcome for RawFd {
    fn from_outcome(outcome: Outcome) -> Result<Self> {
        match outcome {
            Outcome::Opened(fd) => Ok(fd),
            other => Err(mismatch("open", &other)),
        }
    }
}

impl FromOutcome for () {
    fn from_outcome(outcome: Outcome) -> Result<Self> {
        match outcome {
            Outcome::Closed => Ok(()),
            other => Err(mismatch("close", &other)),
        }
    }
}

impl FromOutcome for Vec<u8> {
    fn from_outcome(outcome: Outcome) -> Result<Self> {
        match outcome {
            Outcome::Read(buffer) => Ok(buffer),
            other => Err(mismatch("read", &other)),
        }
    }
}

impl FromOutcome for usize {
    fn from_outcome(outcome: Outcome) -> Result<Self> {
        match outcome {
            Outcome::Written(bytes) => Ok(bytes),
            other => Err(mismatch("write", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Outcome) -> UringFileError {
    UringFileError::Io(std::io::Error::other(format!(
        "expected {expected} outcome, got {got:?}"
    )))
}

#[derive(Debug)]
enum Slot {
    Waiting(Option<Waker>),
    Ready(Result<Outcome>),
    Taken,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A poisoned slot still holds a consistent enum value.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Future resolving to the result of one submitted operation.
///
/// Created by the `Ring::submit_*` methods. Resolves exactly once and must
/// not be polled again after it returned `Poll::Ready`.
#[must_use = "an operation token does nothing unless awaited"]
#[derive(Debug)]
pub struct OperationToken<T> {
    shared: Arc<Shared>,
    _output: PhantomData<fn() -> T>,
}

/// Write side of an [`OperationToken`], held by the correlation table.
#[derive(Debug)]
pub struct OperationCompleter {
    shared: Option<Arc<Shared>>,
}

impl<T: FromOutcome> OperationToken<T> {
    /// Create a linked token/completer pair.
    pub fn pair() -> (Self, OperationCompleter) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Waiting(None)),
        });
        let token = Self {
            shared: Arc::clone(&shared),
            _output: PhantomData,
        };
        (
            token,
            OperationCompleter {
                shared: Some(shared),
            },
        )
    }

    /// Returns true once the operation has been resolved and not yet taken.
    pub fn is_ready(&self) -> bool {
        matches!(*self.shared.lock(), Slot::Ready(_))
    }
}

impl<T: FromOutcome> Future for OperationToken<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Ready(result) => Poll::Ready(result.and_then(T::from_outcome)),
            Slot::Waiting(_) => {
                *slot = Slot::Waiting(Some(cx.waker().clone()));
                Poll::Pending
            }
            Slot::Taken => panic!("OperationToken polled after completion"),
        }
    }
}

impl OperationCompleter {
    /// Resolve the linked token, waking its waiter if one is parked.
    pub fn complete(mut self, result: Result<Outcome>) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, result);
        }
    }

    /// Returns true if the awaiting side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.shared
            .as_ref()
            .map_or(true, |shared| Arc::strong_count(shared) == 1)
    }
}

impl Drop for OperationCompleter {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            resolve(&shared, Err(UringFileError::RingShutdown));
        }
    }
}

fn resolve(shared: &Shared, result: Result<Outcome>) {
    let waker = {
        let mut slot = shared.lock();
        match std::mem::replace(&mut *slot, Slot::Ready(result)) {
            Slot::Waiting(waker) => waker,
            previous => {
                // Resolution is single-assignment; keep the first value.
                *slot = previous;
                None
            }
        }
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}
