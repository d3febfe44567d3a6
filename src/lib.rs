//! # uring-file: async file I/O over io_uring
//!
//! Positional file I/O for tokio applications, submitted through a shared
//! io_uring instance. Every open, close, read and write becomes one
//! submission queue entry; a dispatcher task wakes on an eventfd the kernel
//! signals on completion and resolves the awaiting caller's token.
//!
//! ## Key Features
//!
//! - **Explicit ring context**: a [`Ring`] is a cheap, clonable handle; the
//!   kernel ring is created lazily by the first submission and torn down
//!   when the last handle drops
//! - **Non-blocking submission**: submitting never waits; awaiting the
//!   returned [`OperationToken`] is the only suspension point
//! - **Owned buffers**: the ring owns every buffer the kernel touches, so a
//!   dropped future can never leave the kernel writing into freed memory
//! - **Graceful degradation**: a synchronous backend takes over where the
//!   kernel or a sandbox refuses io_uring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use uring_file::{File, OpenOptions, Ring};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> uring_file::Result<()> {
//! let ring = Ring::new(32)?;
//!
//! let mut file = File::new(&ring, "hello.txt");
//! file.open(&OpenOptions::create_write()).await?;
//! file.write(b"hello\nworld").await?;
//! file.close().await?;
//!
//! let lines: Vec<Vec<u8>> = uring_file::with_file(&ring, "hello.txt", &OpenOptions::new(), |f| {
//!     Box::pin(async move { f.lines().try_collect().await })
//! })
//! .await?;
//! assert_eq!(lines, vec![b"hello".to_vec(), b"world".to_vec()]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Raw submissions
//!
//! [`File`] is a thin cursor over the ring's four primitives, which can be
//! used directly:
//!
//! ```rust,no_run
//! use uring_file::Ring;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> uring_file::Result<()> {
//! let ring = Ring::new(8)?;
//! let fd = ring.submit_open("data.bin", libc::O_RDONLY, 0, -1)?.await?;
//!
//! // Both reads are in flight at once; each token gets its own bytes.
//! let head = ring.submit_read(fd, 16, 0)?;
//! let tail = ring.submit_read(fd, 16, 16)?;
//! let (head, tail) = futures::try_join!(head, tail)?;
//!
//! ring.submit_close(fd)?.await?;
//! # let _ = (head, tail);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use uring_file::{BackendPreference, Ring, UringFileConfig};
//!
//! # fn main() -> uring_file::Result<()> {
//! // Debug logging and a deeper queue
//! let ring = Ring::with_config(UringFileConfig::development())?;
//!
//! // Force the synchronous backend
//! let config = UringFileConfig::default().with_backend(BackendPreference::Fallback);
//! let ring = Ring::with_config(config)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend; // Backend abstraction for io_uring and the synchronous fallback
pub mod config;
pub mod error;
mod eventfd;
pub mod file;
pub mod future; // Operation result tokens
pub mod logging;
pub mod operation;
pub mod ring;

pub use backend::{is_io_uring_available, Backend};
pub use config::{BackendPreference, FileConfig, LoggingConfig, RingConfig, UringFileConfig};
pub use error::{Result, UringFileError};
pub use eventfd::EventFd;
pub use file::{open, with_file, File, OpenOptions};
pub use future::{OperationToken, Outcome};
pub use logging::{init_logging, LogLevel};
pub use operation::OperationKind;
pub use ring::{Ring, RingStats};
