//! Operation kind definitions.

/// Kind of file operation submitted to the ring.
///
/// Fixed at submission time. The completion dispatcher uses it to decide
/// how a non-negative completion result is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationKind {
    /// Open a path relative to a directory descriptor (`openat`)
    Open = 0,
    /// Close a file descriptor
    Close = 1,
    /// Read from a file descriptor at an offset into an owned buffer
    Read = 2,
    /// Write an owned buffer to a file descriptor at an offset
    Write = 3,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}
