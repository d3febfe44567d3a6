//! Per-file cursor over a shared [`Ring`].
//!
//! A [`File`] remembers a path, the descriptor it was opened with and a byte
//! offset. Every operation submits one or more entries to its ring and
//! suspends only while awaiting them.

mod options;


use std::io;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::stream::{self, Stream};

use crate::error::{Result, UringFileError};
use crate::ring::Ring;

pub use options::OpenOptions;

/// File handle with its own cursor, backed by a shared ring.
///
/// Reads and writes happen at the cursor and advance it. The cursor resets
/// to zero when the file is closed.
///
/// # Example
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use uring_file::{File, OpenOptions, Ring};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> uring_file::Result<()> {
/// let ring = Ring::new(32)?;
///
/// let mut file = File::new(&ring, "hello.txt");
/// file.open(&OpenOptions::create_write()).await?;
/// file.write(b"hello\nworld").await?;
/// file.close().await?;
///
/// file.open(&OpenOptions::new()).await?;
/// {
///     let mut lines = Box::pin(file.lines());
///     while let Some(line) = lines.next().await {
///         println!("{}", String::from_utf8_lossy(&line?));
///     }
/// }
/// file.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct File {
    ring: Ring,
    path: PathBuf,
    fd: Option<RawFd>,
    offset: u64,
    readline_chunk_size: usize,
}

impl File {
    /// Create a closed handle for `path` on `ring`.
    pub fn new(ring: &Ring, path: impl AsRef<Path>) -> Self {
        Self {
            ring: ring.clone(),
            path: path.as_ref().to_path_buf(),
            fd: None,
            offset: 0,
            readline_chunk_size: ring.config().file.readline_chunk_size,
        }
    }

    /// Override the read size used while scanning for newlines.
    ///
    /// A size of zero is replaced by one.
    pub fn with_readline_chunk_size(mut self, chunk_size: usize) -> Self {
        self.readline_chunk_size = chunk_size.max(1);
        self
    }

    /// Open the file with `options`.
    ///
    /// Fails with [`UringFileError::AlreadyOpen`] if a descriptor is held.
    pub async fn open(&mut self, options: &OpenOptions) -> Result<()> {
        if self.fd.is_some() {
            return Err(UringFileError::AlreadyOpen {
                path: self.path.clone(),
            });
        }

        let mode = options
            .mode_value()
            .unwrap_or(self.ring.config().file.default_mode);
        let fd = self
            .ring
            .submit_open(&self.path, options.flags_value(), mode, options.dir_fd_value())?
            .await?;

        tracing::debug!(path = %self.path.display(), fd, "file opened");
        self.fd = Some(fd);
        Ok(())
    }

    /// Open with explicit flags, mode and directory descriptor.
    pub async fn open_with(&mut self, flags: i32, mode: u32, dir_fd: RawFd) -> Result<()> {
        self.open(&OpenOptions::new().flags(flags).mode(mode).dir_fd(dir_fd))
            .await
    }

    /// Open, run `body`, then close whatever `body` returned.
    ///
    /// The file is closed on every exit path. If both `body` and the close
    /// fail, the body's error is returned and the close error is logged.
    ///
    /// ```rust,no_run
    /// # use uring_file::{File, OpenOptions, Ring};
    /// # async fn demo(ring: &Ring) -> uring_file::Result<()> {
    /// let mut file = File::new(ring, "data.bin");
    /// let head = file
    ///     .scoped(&OpenOptions::new(), |f| Box::pin(async move { f.read(Some(16)).await }))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, F>(&mut self, options: &OpenOptions, body: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut File) -> BoxFuture<'a, Result<T>>,
    {
        self.open(options).await?;
        let outcome = body(self).await;

        // The body may have closed the file itself.
        let closed = if self.is_open() {
            self.close().await
        } else {
            Ok(())
        };

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(body_err), Ok(())) => Err(body_err),
            (Err(body_err), Err(close_err)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %close_err,
                    "close failed after scoped body error"
                );
                Err(body_err)
            }
        }
    }

    /// Close the descriptor and reset the cursor.
    ///
    /// The descriptor is forgotten even when the kernel reports a failure;
    /// Linux releases it either way.
    pub async fn close(&mut self) -> Result<()> {
        let fd = self.require_fd()?;
        let token = self.ring.submit_close(fd)?;
        let result = token.await;

        self.fd = None;
        self.offset = 0;
        tracing::debug!(path = %self.path.display(), fd, ok = result.is_ok(), "file closed");
        result
    }

    /// Read up to `size` bytes (or the rest of the file) at the cursor.
    ///
    /// The request is clamped to the bytes left before end of file as
    /// reported by `stat`. At or past end of file this returns an empty
    /// buffer without submitting anything. The cursor advances by the
    /// number of bytes actually returned.
    pub async fn read(&mut self, size: Option<usize>) -> Result<Vec<u8>> {
        let fd = self.require_fd()?;

        let total = std::fs::metadata(&self.path)?.len();
        let remaining = total.saturating_sub(self.offset);
        let wanted = match size {
            Some(size) => remaining.min(size as u64),
            None => remaining,
        };
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let len = usize::try_from(wanted)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let data = self.ring.submit_read(fd, len, self.offset)?.await?;
        self.offset += data.len() as u64;
        Ok(data)
    }

    /// Read the next line, without its `\n` terminator.
    ///
    /// Returns an empty buffer at end of file. A blank line also reads as
    /// empty; use [`File::lines`] to tell the two apart.
    pub async fn readline(&mut self) -> Result<Vec<u8>> {
        Ok(self.next_line().await?.unwrap_or_default())
    }

    /// Stream the remaining lines, ending at end of file.
    ///
    /// Blank lines are yielded as empty buffers. The stream ends after the
    /// first error.
    pub fn lines(&mut self) -> impl Stream<Item = Result<Vec<u8>>> + '_ {
        stream::unfold(Some(self), |file| async move {
            let file = file?;
            match file.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(file))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            let start = self.offset;
            let chunk = self.read(Some(self.readline_chunk_size)).await?;
            if chunk.is_empty() {
                return Ok((!line.is_empty()).then_some(line));
            }

            match chunk.iter().position(|&b| b == b'\n') {
                Some(newline) => {
                    line.extend_from_slice(&chunk[..newline]);
                    // Rewind to just past the newline.
                    self.offset = start + newline as u64 + 1;
                    return Ok(Some(line));
                }
                None => line.extend_from_slice(&chunk),
            }
        }
    }

    /// Write `data` at the cursor and advance it by `data.len()`.
    ///
    /// Returns the number of bytes the kernel reported written.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        let fd = self.require_fd()?;
        let written = self.ring.submit_write(fd, data, self.offset)?.await?;
        self.offset += data.len() as u64;
        Ok(written)
    }

    /// Move the cursor. No I/O happens and the offset is not validated.
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset;
    }

    /// Descriptor held by this file, if open.
    pub fn fileno(&self) -> Option<RawFd> {
        self.fd
    }

    /// Current cursor position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path this handle was created with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true while a descriptor is held.
    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    fn require_fd(&self) -> Result<RawFd> {
        self.fd.ok_or_else(|| UringFileError::NotOpen {
            path: self.path.clone(),
        })
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let Some(fd) = self.fd.take() else {
            return;
        };
        // Nobody can await the close any more; the ring still drains it.
        match self.ring.submit_close(fd) {
            Ok(_token) => tracing::debug!(path = %self.path.display(), fd, "closing file on drop"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                fd,
                error = %e,
                "failed to close file on drop"
            ),
        }
    }
}

/// Open `path` on `ring` and return the open handle.
pub async fn open(ring: &Ring, path: impl AsRef<Path>, options: &OpenOptions) -> Result<File> {
    let mut file = File::new(ring, path);
    file.open(options).await?;
    Ok(file)
}

/// Open `path`, run `body` with the open file, and close it on every exit path.
///
/// See [`File::scoped`] for how errors from `body` and the close combine.
pub async fn with_file<T, F>(
    ring: &Ring,
    path: impl AsRef<Path>,
    options: &OpenOptions,
    body: F,
) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut File) -> BoxFuture<'a, Result<T>>,
{
    let mut file = File::new(ring, path);
    file.scoped(options, body).await
}
