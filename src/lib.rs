//! # lan-media-server
//!
//! Serve the files of one local directory to clients on the LAN, with HTTP
//! [`Range`][1] support so media players can seek and interrupted downloads
//! can resume.
//!
//! A request flows through four stages:
//!
//! 1. [`FileResolver`] turns the requested name into a canonical path under
//!    the configured root, refusing traversal.
//! 2. [`parse_range`] interprets the `Range` header against the file size.
//! 3. [`response::build`] decides status code and headers.
//! 4. [`RangedStream`] copies exactly the selected bytes in bounded memory.
//!
//! Streaming is fully generic: any type implementing [`AsyncRead`] and
//! [`AsyncSeekStart`] can be served through the [`KnownSize`] adapter. There
//! is special cased support for files on disk, see [`KnownSize::file`].
//!
//! ```no_run
//! use lan_media_server::{server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lan_media_server::Error> {
//!     let config = ServerConfig::new("files");
//!     let state = server::AppState::new(config)?;
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, server::router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! [1]: https://www.rfc-editor.org/rfc/rfc9110#name-range-requests

mod file;
mod stream;

pub mod config;
pub mod error;
pub mod listing;
pub mod range;
pub mod resolve;
pub mod response;
pub mod server;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncSeek};

pub use config::ServerConfig;
pub use error::Error;
pub use file::KnownSize;
pub use listing::{list_files, FileEntry};
pub use range::{parse_range, RangeResult};
pub use resolve::{FileResolver, ResolvedFile};
pub use response::{BodyPlan, Disposition, RangedResponse, ResponseDescriptor};
pub use stream::{RangedStream, StreamRequest, FULL_CHUNK_SIZE, PARTIAL_CHUNK_SIZE};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying file.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;
}

/// A single byte range with inclusive bounds, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a range covering `start..=end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "byte range {start}-{end} is inverted");
        ByteRange { start, end }
    }

    /// Number of bytes in the range, never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}
