//! Pull-based chunked body stream.
//!
//! [`ChunkStream`] seeks the underlying body to the window start and then
//! yields bounded chunks until the window is exhausted or the reader hits
//! EOF. Each chunk is read only when the consumer polls for it, so peak
//! memory is one chunk regardless of file size, and dropping the stream
//! (client disconnect) stops all further reads immediately.

use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::RangeBody;

/// Upper bound on a single read. Keeps per-request memory flat while
/// streaming arbitrarily large files.
pub const CHUNK_SIZE: usize = 8192;

/// Response body covering one byte window. Implements [`Stream`], [`Body`],
/// and [`IntoResponse`].
#[pin_project]
#[derive(Debug)]
pub struct ChunkStream<B> {
    state: StreamState,
    length: u64,
    #[pin]
    body: B,
}

impl<B: RangeBody + Send + 'static> ChunkStream<B> {
    /// Stream `length` bytes of `body` starting at offset `start`.
    pub(crate) fn new(body: B, start: u64, length: u64) -> Self {
        ChunkStream {
            state: StreamState::Seek { start },
            length,
            body,
        }
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
}

impl<B: RangeBody + Send + 'static> IntoResponse for ChunkStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: RangeBody> Body for ChunkStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeBody> Stream for ChunkStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let StreamState::Seek { start } = *this.state {
            match this.body.as_mut().start_seek(start) {
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(()) => {
                    let remaining = *this.length;
                    *this.state = StreamState::Seeking { remaining };
                }
            }
        }

        if let StreamState::Seeking { remaining } = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    let buffer = BytesMut::with_capacity(CHUNK_SIZE);
                    *this.state = StreamState::Reading { buffer, remaining };
                }
            }
        }

        if let StreamState::Reading { buffer, remaining } = this.state {
            if *remaining == 0 {
                return Poll::Ready(None);
            }

            // cap this read at the smaller of the chunk buffer and the
            // bytes left in the window
            let uninit = buffer.spare_capacity_mut();
            let nbytes = std::cmp::min(
                uninit.len(),
                usize::try_from(*remaining).unwrap_or(usize::MAX),
            );

            let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

            match this.body.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => match read_buf.filled().len() {
                    // EOF before the window was exhausted: the file is
                    // shorter than requested, terminate cleanly
                    0 => return Poll::Ready(None),
                    n => {
                        // SAFETY: poll_read has initialized `n` additional
                        // bytes past the buffer's current length
                        unsafe { buffer.set_len(buffer.len() + n) }

                        let chunk = mem::replace(buffer, BytesMut::with_capacity(CHUNK_SIZE));

                        // n <= remaining due to the cap above, so this
                        // never underflows
                        *remaining -= n as u64;

                        return Poll::Ready(Some(Ok(chunk.freeze())));
                    }
                },
            }
        }

        unreachable!();
    }
}
