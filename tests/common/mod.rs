//! Shared helpers for integration tests.
//!
//! [`ScriptedBackend`] records what the ring pushes and only completes what
//! the test tells it to, in the order the test chooses.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uring_file::backend::{Backend, PreparedOp, RawCompletion, SubmissionEntry};
use uring_file::{EventFd, OperationKind, Ring, UringFileConfig, UringFileError};

/// Entry as seen by the scripted backend.
#[derive(Debug, Clone, Copy)]
pub struct Pushed {
    pub user_data: u64,
    pub kind: OperationKind,
    /// Address of the read destination, zero for other kinds
    buf: usize,
    len: u32,
}

#[derive(Debug, Default)]
struct Script {
    pushed: Vec<Pushed>,
    outstanding: usize,
    completions: VecDeque<RawCompletion>,
    event_fd: Option<EventFd>,
    submits: usize,
    interrupted_waits: usize,
}

/// Backend that never touches the kernel.
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    capacity: u32,
}

/// Test-side view of a [`ScriptedBackend`].
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    unsafe fn push(&mut self, entry: &SubmissionEntry) -> uring_file::Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.outstanding >= self.capacity as usize {
            return Err(UringFileError::QueueExhausted {
                capacity: self.capacity,
            });
        }

        let (kind, buf, len) = match entry.op {
            PreparedOp::Open { .. } => (OperationKind::Open, 0, 0),
            PreparedOp::Close { .. } => (OperationKind::Close, 0, 0),
            PreparedOp::Read { buf, len, .. } => (OperationKind::Read, buf as usize, len),
            PreparedOp::Write { len, .. } => (OperationKind::Write, 0, len),
        };
        script.pushed.push(Pushed {
            user_data: entry.user_data,
            kind,
            buf,
            len,
        });
        script.outstanding += 1;
        Ok(())
    }

    fn submit(&mut self) -> uring_file::Result<usize> {
        self.script.lock().unwrap().submits += 1;
        Ok(1)
    }

    fn next_completion(&mut self) -> Option<RawCompletion> {
        self.script.lock().unwrap().completions.pop_front()
    }

    fn wait_for_completion(&mut self) -> uring_file::Result<()> {
        let mut script = self.script.lock().unwrap();
        if script.interrupted_waits > 0 {
            script.interrupted_waits -= 1;
            return Err(UringFileError::Io(io::Error::from(
                io::ErrorKind::Interrupted,
            )));
        }
        if script.completions.is_empty() {
            return Err(UringFileError::Io(io::Error::other(
                "no scripted completion to wait for",
            )));
        }
        Ok(())
    }

    fn register_eventfd(&mut self, event_fd: &EventFd) -> uring_file::Result<()> {
        self.script.lock().unwrap().event_fd = Some(event_fd.clone());
        Ok(())
    }

    fn unregister_eventfd(&mut self) -> uring_file::Result<()> {
        self.script.lock().unwrap().event_fd = None;
        Ok(())
    }
}

impl ScriptHandle {
    /// Everything pushed so far, in push order.
    pub fn pushed(&self) -> Vec<Pushed> {
        self.script.lock().unwrap().pushed.clone()
    }

    /// Number of successful submit calls.
    pub fn submits(&self) -> usize {
        self.script.lock().unwrap().submits
    }

    /// Post a completion without signalling the eventfd.
    pub fn complete(&self, user_data: u64, result: i32) {
        let mut script = self.script.lock().unwrap();
        script.outstanding = script.outstanding.saturating_sub(1);
        script
            .completions
            .push_back(RawCompletion { user_data, result });
    }

    /// Make the next `count` waits fail as if a signal arrived.
    pub fn interrupt_waits(&self, count: usize) {
        self.script.lock().unwrap().interrupted_waits = count;
    }

    /// Copy `data` into a pushed read's buffer and post its completion.
    pub fn complete_read(&self, user_data: u64, data: &[u8]) {
        self.fill_read_buffer(user_data, data);
        self.complete(user_data, data.len() as i32);
    }

    /// Copy `data` into a pushed read's buffer, as a kernel worker would.
    pub fn fill_read_buffer(&self, user_data: u64, data: &[u8]) {
        let entry = self
            .pushed()
            .into_iter()
            .find(|p| p.user_data == user_data)
            .expect("no such pushed entry");
        assert_eq!(entry.kind, OperationKind::Read);
        assert!(data.len() <= entry.len as usize);
        // SAFETY: the ring owns the buffer until this completion is consumed.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), entry.buf as *mut u8, data.len());
        }
    }

    /// Signal the registered eventfd as the kernel would.
    pub fn signal(&self) {
        let event_fd = self
            .script
            .lock()
            .unwrap()
            .event_fd
            .clone()
            .expect("eventfd not registered");
        event_fd.signal().unwrap();
    }
}

/// Ring backed by a fresh scripted backend with `capacity` slots.
pub fn scripted_ring(capacity: u32) -> (Ring, ScriptHandle) {
    let script = Arc::new(Mutex::new(Script::default()));
    let handle = ScriptHandle {
        script: Arc::clone(&script),
    };
    let config = UringFileConfig::testing().with_queue_depth(capacity);
    let ring = Ring::with_backend(config, move |entries| {
        Ok(Box::new(ScriptedBackend {
            script: Arc::clone(&script),
            capacity: entries,
        }) as Box<dyn Backend>)
    })
    .unwrap();
    (ring, handle)
}

/// Ring using the synchronous fallback backend.
pub fn fallback_ring() -> Ring {
    Ring::with_config(UringFileConfig::testing()).unwrap()
}

/// Temporary file with `contents`; keep the directory alive while in use.
pub fn fixture(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.bin");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
