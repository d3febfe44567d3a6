//! Shared io_uring handle and its completion dispatcher.
//!
//! This module provides the main [`Ring`] type. A ring owns the kernel
//! submission/completion queues, an eventfd that the kernel signals on every
//! completion, and the table correlating in-flight operations with the tokens
//! their callers await.

mod completion;
mod core;
mod stats;


pub use self::core::Ring;
pub use stats::RingStats;
