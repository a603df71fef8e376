use std::io;
use std::mem;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::{ready, Stream};
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::{ByteRange, KnownSize, RangeBody};

/// Chunk size when the whole file is sent.
pub const FULL_CHUNK_SIZE: usize = 1024 * 1024;

/// Chunk size for partial content, smaller to get the first byte out sooner.
pub const PARTIAL_CHUNK_SIZE: usize = 8 * 1024;

/// What to stream: a file, and optionally the slice of it to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub path: PathBuf,
    pub range: Option<ByteRange>,
    /// File size the response headers were computed from. A whole-file
    /// stream sends exactly this many bytes, whatever the file holds by the
    /// time it is opened.
    pub size: u64,
}

/// Response body stream. Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Emits exactly the requested bytes, one chunk at a time, then ends. The
/// underlying body is dropped as soon as the stream finishes or fails, or when
/// the stream itself is dropped.
#[pin_project]
pub struct RangedStream<B> {
    state: StreamState,
    length: u64,
    chunk_size: usize,
    #[pin]
    body: Option<B>,
}

impl<B: RangeBody + Send + 'static> RangedStream<B> {
    /// Stream `range` out of `body`, or all of it when `range` is `None`.
    ///
    /// `range` must lie within `body.byte_size()`.
    pub fn new(body: B, range: Option<ByteRange>) -> Self {
        match range {
            None => {
                let length = body.byte_size();
                Self::with_chunk_size(body, 0, length, FULL_CHUNK_SIZE)
            }
            Some(range) => Self::with_chunk_size(body, range.start, range.len(), PARTIAL_CHUNK_SIZE),
        }
    }

    pub(crate) fn with_chunk_size(body: B, start: u64, length: u64, chunk_size: usize) -> Self {
        RangedStream {
            state: StreamState::Seek { start, remaining: length },
            length,
            chunk_size,
            body: Some(body),
        }
    }

    /// Total number of bytes this stream yields when it runs to completion.
    pub fn content_length(&self) -> u64 {
        self.length
    }
}

impl RangedStream<KnownSize<tokio::fs::File>> {
    /// Open the file named by `request` and prepare to stream it.
    pub async fn open(request: &StreamRequest) -> io::Result<Self> {
        let body = KnownSize::file(&request.path).await?;
        Ok(match request.range {
            None => RangedStream::with_chunk_size(body, 0, request.size, FULL_CHUNK_SIZE),
            Some(range) => RangedStream::new(body, Some(range)),
        })
    }
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("length", &self.length)
            .field("chunk_size", &self.chunk_size)
            .field("open", &self.body.is_some())
            .finish()
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64, remaining: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: RangeBody> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn is_end_stream(&self) -> bool {
        self.body.is_none()
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeBody> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        let Some(body) = this.body.as_mut().as_pin_mut() else {
            return Poll::Ready(None);
        };

        let item = ready!(poll_chunk(body, this.state, *this.chunk_size, cx));

        if !matches!(item, Some(Ok(_))) {
            // finished or broken: release the file handle now, not when the
            // response body is eventually dropped
            this.body.set(None);
            if let Some(Err(e)) = &item {
                tracing::error!(error = %e, "stream aborted mid-body");
            }
        }

        Poll::Ready(item)
    }
}

fn poll_chunk<B: RangeBody>(
    mut body: Pin<&mut B>,
    state: &mut StreamState,
    chunk_size: usize,
    cx: &mut Context<'_>,
) -> Poll<Option<io::Result<Bytes>>> {
    if let StreamState::Seek { start, remaining } = *state {
        match body.as_mut().start_seek(start) {
            Err(e) => { return Poll::Ready(Some(Err(e))); }
            Ok(()) => {
                *state = StreamState::Seeking { remaining };
            }
        }
    }

    if let StreamState::Seeking { remaining } = *state {
        match body.as_mut().poll_complete(cx) {
            Poll::Pending => { return Poll::Pending; }
            Poll::Ready(Err(e)) => { return Poll::Ready(Some(Err(e))); }
            Poll::Ready(Ok(())) => {
                *state = StreamState::Reading { buffer: BytesMut::new(), remaining };
            }
        }
    }

    let StreamState::Reading { buffer, remaining } = state else {
        unreachable!("seek states always advance to reading");
    };

    if *remaining == 0 {
        return Poll::Ready(None);
    }

    // the previous chunk was handed off, so at most one buffer is live here
    if buffer.capacity() == 0 {
        *buffer = BytesMut::with_capacity(chunk_size);
    }

    let uninit = buffer.spare_capacity_mut();

    // calculate max number of bytes to read in this iteration, the
    // smaller of the buffer size and the number of bytes remaining
    let nbytes = std::cmp::min(
        uninit.len(),
        usize::try_from(*remaining).unwrap_or(usize::MAX),
    );

    let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

    match body.as_mut().poll_read(cx, &mut read_buf) {
        Poll::Pending => Poll::Pending,
        Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
        Poll::Ready(Ok(())) => {
            match read_buf.filled().len() {
                0 => {
                    // the file shrank underneath us
                    Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file ended with {remaining} bytes still expected"),
                    ))))
                }
                n => {
                    // SAFETY: poll_read has filled the buffer with `n`
                    // additional bytes. `buffer.len` should always be
                    // 0 here, but include it for rigorous correctness
                    unsafe { buffer.set_len(buffer.len() + n); }

                    // take the filled buffer, the next read allocates afresh
                    let chunk = mem::take(buffer);

                    // n <= remaining due to the cmp::min above
                    *remaining -= n as u64;

                    Poll::Ready(Some(Ok(chunk.freeze())))
                }
            }
        }
    }
}
