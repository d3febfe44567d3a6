//! Ring statistics and monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a ring's counters.
///
/// Counters are cumulative since the ring handle was created and survive
/// teardown and re-initialization.
///
/// # Examples
///
/// ```rust
/// use uring_file::Ring;
///
/// let ring = Ring::new(8)?;
/// let stats = ring.stats();
/// assert_eq!(stats.submissions, 0);
/// assert!(stats.is_idle());
/// # Ok::<(), uring_file::UringFileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    /// Operations successfully pushed and submitted
    pub submissions: u64,
    /// Completions resolved by the dispatcher
    pub completions: u64,
    /// Dispatcher passes over the completion queue
    pub dispatch_rounds: u64,
    /// Times the kernel ring was created
    pub setups: u64,
    /// Times the kernel ring was released
    pub teardowns: u64,
    /// Operations currently awaiting a completion
    pub in_flight: usize,
}

impl RingStats {
    /// Returns true if no operation is awaiting a completion.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Average number of completions handled per dispatcher pass.
    ///
    /// Returns 0.0 if the dispatcher has not run yet.
    pub fn completions_per_round(&self) -> f64 {
        if self.dispatch_rounds == 0 {
            0.0
        } else {
            self.completions as f64 / self.dispatch_rounds as f64
        }
    }
}

/// Live counters shared by every handle to a ring.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) submissions: AtomicU64,
    pub(crate) completions: AtomicU64,
    pub(crate) dispatch_rounds: AtomicU64,
    pub(crate) setups: AtomicU64,
    pub(crate) teardowns: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, in_flight: usize) -> RingStats {
        RingStats {
            submissions: self.submissions.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            dispatch_rounds: self.dispatch_rounds.load(Ordering::Relaxed),
            setups: self.setups.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            in_flight,
        }
    }
}
