//! Operation kinds and the in-flight correlation table.

pub(crate) mod tracker;
mod types;

pub use types::OperationKind;
