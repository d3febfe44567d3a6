//! Completion dispatcher task.

use std::sync::{Arc, Weak};

use tokio::io::unix::AsyncFd;

use super::core::RingInner;
use crate::error::UringFileError;
use crate::eventfd::EventFd;

/// Wait for eventfd readiness and drain the completion queue, forever.
///
/// The counter is read before draining, so a completion posted during the
/// drain makes the eventfd readable again and is picked up next round. The
/// task ends when the ring is dropped, torn down or hits a protocol
/// violation.
pub(super) async fn run_dispatcher(ring: Weak<RingInner>, event_fd: Arc<AsyncFd<EventFd>>) {
    loop {
        let mut guard = match event_fd.readable().await {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!(error = %e, "eventfd readiness failed, dispatcher exiting");
                return;
            }
        };

        match guard.try_io(|fd| fd.get_ref().read()) {
            Ok(Ok(signals)) => tracing::trace!(signals, "completion signal"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "eventfd read failed, dispatcher exiting");
                return;
            }
            // Spurious wakeup; readiness was cleared by try_io.
            Err(_would_block) => continue,
        }
        drop(guard);

        let Some(ring) = ring.upgrade() else {
            return;
        };

        match ring.dispatch_completions() {
            Ok(count) => tracing::trace!(count, "completions dispatched"),
            Err(e @ UringFileError::ProtocolViolation { .. }) => {
                tracing::error!(error = %e, "ring state is corrupt, aborting ring");
                if let Err(e) = ring.teardown() {
                    tracing::warn!(error = %e, "teardown after protocol violation failed");
                }
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "completion dispatch failed, dispatcher exiting");
                return;
            }
        }
    }
}
