//! Completion dispatch tests driven by a scripted backend.
//!
//! These tests control exactly which completions exist and in which order,
//! which the real kernel ring cannot guarantee.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::scripted_ring;
use tokio::time::timeout;
use uring_file::{OperationKind, UringFileError};

#[tokio::test(flavor = "current_thread")]
async fn out_of_order_completions_reach_the_right_tokens() {
    let (ring, script) = scripted_ring(8);

    let first = ring.submit_read(5, 4, 0).unwrap();
    let second = ring.submit_read(5, 4, 4).unwrap();
    let pushed = script.pushed();
    assert_eq!(pushed.len(), 2);

    script.complete_read(pushed[1].user_data, b"bbbb");
    script.complete_read(pushed[0].user_data, b"aa");
    assert_eq!(ring.dispatch_completions().unwrap(), 2);

    assert_eq!(first.await.unwrap(), b"aa");
    assert_eq!(second.await.unwrap(), b"bbbb");
}

#[tokio::test(flavor = "current_thread")]
async fn dispatcher_resolves_on_signal() {
    let (ring, script) = scripted_ring(4);

    let token = ring.submit_write(7, b"hello", 0).unwrap();
    let id = script.pushed()[0].user_data;
    script.complete(id, 5);
    script.signal();

    let written = timeout(Duration::from_secs(5), token)
        .await
        .expect("dispatcher did not run")
        .unwrap();
    assert_eq!(written, 5);
    assert_eq!(ring.stats().completions, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn negative_results_become_kernel_failures() {
    let (ring, script) = scripted_ring(4);

    let token = ring
        .submit_open("/nowhere/secret", libc::O_RDONLY, 0, -1)
        .unwrap();
    script.complete(script.pushed()[0].user_data, -libc::EACCES);
    ring.dispatch_completions().unwrap();

    match token.await {
        Err(UringFileError::KernelOperationFailed { op, code }) => {
            assert_eq!(op, OperationKind::Open);
            assert_eq!(code, libc::EACCES);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_completion_is_a_protocol_violation() {
    let (ring, script) = scripted_ring(4);

    let known = ring.submit_close(3).unwrap();
    script.complete(script.pushed()[0].user_data, 0);
    script.complete(999, 0);

    match ring.dispatch_completions() {
        Err(UringFileError::ProtocolViolation { user_data }) => assert_eq!(user_data, 999),
        other => panic!("unexpected result: {other:?}"),
    }
    // Completions popped before the bad one are still delivered.
    known.await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn dispatcher_aborts_ring_on_protocol_violation() {
    let (ring, script) = scripted_ring(4);

    let pending = ring.submit_close(3).unwrap();
    script.complete(4242, 0);
    script.signal();

    let result = timeout(Duration::from_secs(5), pending)
        .await
        .expect("dispatcher did not abort the ring");
    assert!(matches!(result, Err(UringFileError::RingShutdown)));
    assert!(!ring.is_initialized());
    assert_eq!(ring.stats().teardowns, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn full_queue_is_reported_and_nothing_recorded() {
    let (ring, script) = scripted_ring(2);

    let a = ring.submit_close(10).unwrap();
    let _b = ring.submit_close(11).unwrap();

    match ring.submit_close(12) {
        Err(UringFileError::QueueExhausted { capacity }) => assert_eq!(capacity, 2),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(ring.operations_in_flight(), 2);
    assert_eq!(ring.stats().submissions, 2);
    assert_eq!(script.pushed().len(), 2);
    assert_eq!(script.submits(), 2);

    // Freeing a slot makes room again.
    script.complete(script.pushed()[0].user_data, 0);
    ring.dispatch_completions().unwrap();
    a.await.unwrap();
    let _c = ring.submit_close(12).unwrap();
    assert_eq!(ring.operations_in_flight(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn in_flight_ids_are_unique_and_nonzero() {
    let (ring, script) = scripted_ring(16);

    let _tokens: Vec<_> = (0..10).map(|fd| ring.submit_close(fd).unwrap()).collect();
    let ids: HashSet<u64> = script.pushed().iter().map(|p| p.user_data).collect();
    assert_eq!(ids.len(), 10);
    assert!(!ids.contains(&0));
}

#[tokio::test(flavor = "current_thread")]
async fn dropped_token_entry_is_still_removed() {
    let (ring, script) = scripted_ring(4);

    drop(ring.submit_read(3, 8, 0).unwrap());
    script.complete_read(script.pushed()[0].user_data, b"ignored");

    assert_eq!(ring.dispatch_completions().unwrap(), 1);
    assert_eq!(ring.operations_in_flight(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn teardown_abandons_operations_that_never_complete() {
    let (ring, script) = scripted_ring(4);

    let stuck = ring.submit_read(3, 8, 0).unwrap();
    let user_data = script.pushed()[0].user_data;
    // The scripted backend has nothing to wait for, so draining gives up.
    assert!(ring.teardown().is_err());
    assert!(matches!(stuck.await, Err(UringFileError::RingShutdown)));
    assert_eq!(ring.operations_in_flight(), 0);

    // The buffer was never freed, so a late write is still harmless.
    script.fill_read_buffer(user_data, b"too late");

    ring.teardown().unwrap();
    assert_eq!(ring.stats().teardowns, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn teardown_resolves_completed_but_undispatched_operations() {
    let (ring, script) = scripted_ring(4);

    let token = ring.submit_write(3, b"abc", 0).unwrap();
    script.complete(script.pushed()[0].user_data, 3);

    ring.teardown().unwrap();
    assert_eq!(token.await.unwrap(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn teardown_retries_interrupted_waits() {
    let (ring, script) = scripted_ring(4);

    let token = ring.submit_read(3, 8, 0).unwrap();
    let user_data = script.pushed()[0].user_data;
    script.interrupt_waits(3);
    script.complete_read(user_data, b"survived");

    ring.teardown().unwrap();
    assert_eq!(token.await.unwrap(), b"survived");
    assert_eq!(ring.stats().completions, 1);
}

#[test]
fn dispatch_before_setup_is_a_no_op() {
    let (ring, script) = scripted_ring(4);
    assert_eq!(ring.dispatch_completions().unwrap(), 0);
    assert!(script.pushed().is_empty());
}
