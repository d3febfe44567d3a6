//! Ring handle: lazy setup, submission and teardown.

use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::completion;
use super::stats::{RingStats, StatsCounters};
use crate::backend::{detect_backend, Backend, BackendFactory, PreparedOp, SubmissionEntry};
use crate::config::UringFileConfig;
use crate::error::{Result, UringFileError};
use crate::eventfd::EventFd;
use crate::future::{FromOutcome, OperationToken};
use crate::logging::init_logging;
use crate::operation::tracker::{Auxiliary, InFlight, OperationTracker};
use crate::operation::OperationKind;

/// Handle to an io_uring instance shared by any number of files.
///
/// A `Ring` is cheap to create: the kernel ring, its eventfd and the
/// completion dispatcher task are set up lazily by the first submission,
/// which must happen inside a tokio runtime. Clones share the same ring.
/// When the last clone is dropped the ring is torn down.
///
/// # Threading
///
/// `Ring` is `Send + Sync`. Submission takes a short-lived lock on the ring
/// state and never blocks on the kernel; awaiting the returned
/// [`OperationToken`] is the only suspension point.
///
/// # Panics
///
/// The first submission registers the eventfd with the runtime's IO driver
/// and panics if the runtime was built without it (see
/// `tokio::runtime::Builder::enable_io`). Outside any runtime it fails with
/// [`UringFileError::NoRuntime`] instead.
///
/// # Example
///
/// ```rust,no_run
/// use uring_file::Ring;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> uring_file::Result<()> {
/// let ring = Ring::new(32)?;
/// let fd = ring.submit_open("/etc/hostname", libc::O_RDONLY, 0, -1)?.await?;
/// let bytes = ring.submit_read(fd, 64, 0)?.await?;
/// ring.submit_close(fd)?.await?;
/// println!("{}", String::from_utf8_lossy(&bytes));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Ring {
    inner: Arc<RingInner>,
}

pub(crate) struct RingInner {
    config: UringFileConfig,
    factory: Box<BackendFactory>,
    state: Mutex<RingState>,
    stats: StatsCounters,
}

#[derive(Default)]
struct RingState {
    active: Option<Active>,
    operations: OperationTracker,
}

/// Resources that exist only between setup and teardown.
struct Active {
    backend: Box<dyn Backend>,
    event_fd: Arc<AsyncFd<EventFd>>,
    dispatcher: JoinHandle<()>,
}

static_assertions::assert_impl_all!(Ring: Send, Sync);

impl Ring {
    /// Create a ring handle with `queue_depth` submission slots.
    ///
    /// Nothing is allocated in the kernel until the first submission.
    pub fn new(queue_depth: u32) -> Result<Self> {
        Self::with_config(UringFileConfig::default().with_queue_depth(queue_depth))
    }

    /// Create a ring handle from a full configuration.
    ///
    /// Installs a log subscriber when `config.logging.enabled` is set.
    pub fn with_config(config: UringFileConfig) -> Result<Self> {
        let preference = config.ring.backend;
        Self::with_backend(config, move |entries| detect_backend(entries, preference))
    }

    /// Create a ring handle whose backend is produced by `factory`.
    ///
    /// The factory receives the configured queue depth and runs once per
    /// setup, so a ring that is torn down and used again calls it again.
    pub fn with_backend<F>(config: UringFileConfig, factory: F) -> Result<Self>
    where
        F: Fn(u32) -> Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        config.validate()?;
        init_logging(&config.logging);

        Ok(Self {
            inner: Arc::new(RingInner {
                config,
                factory: Box::new(factory),
                state: Mutex::new(RingState::default()),
                stats: StatsCounters::default(),
            }),
        })
    }

    /// Configuration this ring was created with.
    pub fn config(&self) -> &UringFileConfig {
        &self.inner.config
    }

    /// Configured number of submission queue entries.
    pub fn queue_depth(&self) -> u32 {
        self.inner.config.ring.queue_depth
    }

    /// Returns true between setup and teardown.
    pub fn is_initialized(&self) -> bool {
        self.inner.with_state(|state| state.active.is_some())
    }

    /// Name of the active backend, if the ring is set up.
    pub fn backend_name(&self) -> Option<&'static str> {
        self.inner
            .with_state(|state| state.active.as_ref().map(|active| active.backend.name()))
    }

    /// Number of operations awaiting a completion.
    pub fn operations_in_flight(&self) -> usize {
        self.inner.with_state(|state| state.operations.count())
    }

    /// Snapshot of this ring's counters.
    pub fn stats(&self) -> RingStats {
        let in_flight = self.operations_in_flight();
        self.inner.stats.snapshot(in_flight)
    }

    /// Submit an `openat` of `path` (made absolute against the current
    /// directory) and return a token resolving to the new descriptor.
    pub fn submit_open(
        &self,
        path: impl AsRef<Path>,
        flags: i32,
        mode: u32,
        dir_fd: RawFd,
    ) -> Result<OperationToken<RawFd>> {
        let absolute = std::path::absolute(path.as_ref())?;
        let c_path = CString::new(absolute.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        self.inner
            .submit(OperationKind::Open, dir_fd, Auxiliary::Path(c_path), |aux| {
                PreparedOp::Open {
                    dir_fd,
                    path: aux.as_mut_ptr() as *const libc::c_char,
                    flags,
                    mode,
                }
            })
    }

    /// Submit a `close` of `fd`.
    pub fn submit_close(&self, fd: RawFd) -> Result<OperationToken<()>> {
        self.inner
            .submit(OperationKind::Close, fd, Auxiliary::None, |_| {
                PreparedOp::Close { fd }
            })
    }

    /// Submit a read of up to `len` bytes at `offset`.
    ///
    /// The token resolves to exactly the bytes the kernel transferred,
    /// which may be fewer than requested.
    pub fn submit_read(&self, fd: RawFd, len: usize, offset: u64) -> Result<OperationToken<Vec<u8>>> {
        let len32 = transfer_len(len)?;
        self.inner.submit(
            OperationKind::Read,
            fd,
            Auxiliary::ReadBuffer(vec![0; len]),
            |aux| PreparedOp::Read {
                fd,
                buf: aux.as_mut_ptr(),
                len: len32,
                offset,
            },
        )
    }

    /// Submit a write of `data` at `offset`.
    ///
    /// The bytes are copied into ring-owned memory, so `data` may be
    /// dropped as soon as this returns. The token resolves to the number of
    /// bytes the kernel wrote.
    pub fn submit_write(&self, fd: RawFd, data: &[u8], offset: u64) -> Result<OperationToken<usize>> {
        let len32 = transfer_len(data.len())?;
        self.inner.submit(
            OperationKind::Write,
            fd,
            Auxiliary::WriteBuffer(data.to_vec()),
            |aux| PreparedOp::Write {
                fd,
                buf: aux.as_mut_ptr() as *const u8,
                len: len32,
                offset,
            },
        )
    }

    /// Drain every available completion and resolve its token.
    ///
    /// The dispatcher task calls this whenever the eventfd becomes readable;
    /// calling it by hand is harmless. Returns the number of completions
    /// resolved. An unknown correlation ID stops the drain with
    /// [`UringFileError::ProtocolViolation`] after resolving the completions
    /// popped before it.
    pub fn dispatch_completions(&self) -> Result<usize> {
        self.inner.dispatch_completions()
    }

    /// Release the kernel ring, eventfd and dispatcher.
    ///
    /// Blocks until every in-flight operation has completed, so kernel
    /// writes never outlive their buffers. If waiting fails for a reason
    /// other than an interrupted syscall, the operations still in flight
    /// resolve with [`UringFileError::RingShutdown`] and their buffers are
    /// leaked, since the kernel may still write into them.
    ///
    /// Calling this on a ring that is not set up is a no-op. A later
    /// submission sets the ring up again.
    pub fn teardown(&self) -> Result<()> {
        self.inner.teardown()
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("queue_depth", &self.queue_depth())
            .field("backend", &self.backend_name())
            .field("in_flight", &self.operations_in_flight())
            .finish()
    }
}

fn transfer_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        UringFileError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("transfer of {len} bytes exceeds the per-operation limit"),
        ))
    })
}

impl RingInner {
    fn lock(&self) -> Result<MutexGuard<'_, RingState>> {
        self.state.lock().map_err(|_| UringFileError::RingPoisoned)
    }

    /// Read-only view of the state that tolerates poisoning.
    fn with_state<R>(&self, f: impl FnOnce(&RingState) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn activate<'a>(self: &Arc<Self>, slot: &'a mut Option<Active>) -> Result<&'a mut Active> {
        let active = match slot.take() {
            Some(active) => active,
            None => self.setup()?,
        };
        Ok(slot.insert(active))
    }

    fn setup(self: &Arc<Self>) -> Result<Active> {
        let runtime = Handle::try_current().map_err(|_| UringFileError::NoRuntime)?;
        let queue_depth = self.config.ring.queue_depth;

        let mut backend = (self.factory)(queue_depth)?;
        let event_fd = EventFd::new()?;
        backend.register_eventfd(&event_fd)?;
        let event_fd = Arc::new(AsyncFd::with_interest(event_fd, Interest::READABLE)?);

        let dispatcher = runtime.spawn(completion::run_dispatcher(
            Arc::downgrade(self),
            Arc::clone(&event_fd),
        ));

        StatsCounters::bump(&self.stats.setups, 1);
        tracing::info!(
            backend = backend.name(),
            queue_depth,
            capacity = backend.capacity(),
            "ring initialized"
        );

        Ok(Active {
            backend,
            event_fd,
            dispatcher,
        })
    }

    fn submit<T: FromOutcome>(
        self: &Arc<Self>,
        kind: OperationKind,
        fd: RawFd,
        mut auxiliary: Auxiliary,
        prepare: impl FnOnce(&mut Auxiliary) -> PreparedOp,
    ) -> Result<OperationToken<T>> {
        // Heap storage does not move with `auxiliary`, so the pointers in
        // `op` stay valid once the auxiliary is stored in the tracker.
        let op = prepare(&mut auxiliary);

        let mut guard = self.lock()?;
        let RingState { active, operations } = &mut *guard;
        let active = self.activate(active)?;

        let user_data = operations.reserve_id();
        let entry = SubmissionEntry { user_data, op };

        // SAFETY: the tracker owns `auxiliary` until this entry's completion
        // has been consumed, and teardown leaks the memory of entries whose
        // completion it never saw.
        unsafe { active.backend.push(&entry)? };

        let (token, completer) = OperationToken::pair();
        let bytes = auxiliary.len();
        operations.insert(user_data, InFlight::new(kind, fd, completer, auxiliary));
        StatsCounters::bump(&self.stats.submissions, 1);
        tracing::trace!(user_data, fd, bytes, op = %kind, "operation submitted");

        if let Err(e) = active.backend.submit() {
            tracing::warn!(user_data, op = %kind, error = %e, "submit failed, entry stays queued");
            return Err(e);
        }

        Ok(token)
    }

    pub(crate) fn dispatch_completions(&self) -> Result<usize> {
        let mut ready = Vec::new();
        let mut unknown = None;

        {
            let mut guard = self.lock()?;
            let RingState { active, operations } = &mut *guard;
            let Some(active) = active.as_mut() else {
                return Ok(0);
            };

            while let Some(cqe) = active.backend.next_completion() {
                match operations.complete_operation(cqe.user_data) {
                    Some(entry) => ready.push((cqe.user_data, entry, cqe.result)),
                    None => {
                        unknown = Some(cqe.user_data);
                        break;
                    }
                }
            }
        }

        // Resolve outside the lock so woken tasks can submit right away.
        let dispatched = ready.len();
        for (user_data, entry, result) in ready {
            tracing::trace!(
                user_data,
                fd = entry.fd,
                op = %entry.kind,
                result,
                abandoned = entry.is_abandoned(),
                "operation completed"
            );
            entry.resolve(result);
        }

        StatsCounters::bump(&self.stats.completions, dispatched as u64);
        StatsCounters::bump(&self.stats.dispatch_rounds, 1);

        match unknown {
            Some(user_data) => Err(UringFileError::ProtocolViolation { user_data }),
            None => Ok(dispatched),
        }
    }

    pub(crate) fn teardown(&self) -> Result<()> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut active) = guard.active.take() else {
            return Ok(());
        };

        if guard.operations.has_operations() {
            tracing::debug!(
                pending = ?guard.operations.debug_info(),
                "waiting for in-flight operations before teardown"
            );
        }

        let mut result = Ok(());
        let mut drained = Vec::new();
        while guard.operations.has_operations() {
            match active.backend.wait_for_completion() {
                Ok(()) => {}
                Err(UringFileError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        remaining = guard.operations.count(),
                        "gave up waiting for in-flight operations"
                    );
                    result = Err(e);
                    break;
                }
            }
            while let Some(cqe) = active.backend.next_completion() {
                match guard.operations.complete_operation(cqe.user_data) {
                    Some(entry) => drained.push((entry, cqe.result)),
                    None => tracing::warn!(
                        user_data = cqe.user_data,
                        "discarding completion for unknown operation during teardown"
                    ),
                }
            }
        }

        if let Err(e) = active.backend.unregister_eventfd() {
            tracing::warn!(error = %e, "failed to unregister eventfd");
            result = result.and(Err(e));
        }

        let Active {
            backend,
            event_fd,
            dispatcher,
        } = active;
        dispatcher.abort();
        drop(backend);
        let abandoned = guard.operations.drain();
        drop(guard);
        drop(event_fd);

        let completed = drained.len();
        for (entry, res) in drained {
            entry.resolve(res);
        }
        if !abandoned.is_empty() {
            tracing::warn!(
                count = abandoned.len(),
                "abandoning operations without completion, leaking their buffers"
            );
        }
        for entry in abandoned {
            entry.abandon();
        }

        StatsCounters::bump(&self.stats.completions, completed as u64);
        StatsCounters::bump(&self.stats.teardowns, 1);
        tracing::info!(completed, "ring torn down");

        result
    }
}

impl Drop for RingInner {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %e, "ring teardown failed during drop");
        }
    }
}
