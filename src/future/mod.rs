//! Async/await integration for ring operations.
//!
//! Each submission hands back an [`OperationToken`] that the caller awaits.
//! The completion dispatcher resolves it through the paired
//! [`OperationCompleter`] stored in the ring's correlation table.

mod token;

pub use token::{FromOutcome, OperationCompleter, OperationToken, Outcome};
