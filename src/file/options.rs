//! Options for opening a [`File`](super::File).

use std::os::unix::io::RawFd;

/// Flags, permission bits and directory descriptor for an `openat`.
///
/// Defaults to read-only, the ring's configured default mode, and a
/// directory descriptor of `-1` (paths are made absolute before
/// submission, so the directory descriptor rarely matters).
///
/// # Examples
///
/// ```rust
/// use uring_file::OpenOptions;
///
/// let options = OpenOptions::new()
///     .flags(libc::O_CREAT | libc::O_WRONLY)
///     .mode(0o600);
/// assert_eq!(options.flags_value(), libc::O_CREAT | libc::O_WRONLY);
/// assert_eq!(options.mode_value(), Some(0o600));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    flags: i32,
    mode: Option<u32>,
    dir_fd: RawFd,
}

impl OpenOptions {
    /// Read-only options with default mode and directory descriptor.
    pub const fn new() -> Self {
        Self {
            flags: libc::O_RDONLY,
            mode: None,
            dir_fd: -1,
        }
    }

    /// Options for creating (or reusing) a file and writing to it.
    pub const fn create_write() -> Self {
        Self::new().flags(libc::O_CREAT | libc::O_WRONLY)
    }

    /// Options for reading and writing an existing file.
    pub const fn read_write() -> Self {
        Self::new().flags(libc::O_RDWR)
    }

    /// Set the raw `open(2)` flags.
    pub const fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the permission bits used when the file is created.
    pub const fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the directory descriptor the path is resolved against.
    pub const fn dir_fd(mut self, dir_fd: RawFd) -> Self {
        self.dir_fd = dir_fd;
        self
    }

    /// Raw `open(2)` flags.
    pub const fn flags_value(&self) -> i32 {
        self.flags
    }

    /// Explicit permission bits, if any were set.
    pub const fn mode_value(&self) -> Option<u32> {
        self.mode
    }

    /// Directory descriptor.
    pub const fn dir_fd_value(&self) -> RawFd {
        self.dir_fd
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}
