//! # linear-pdf-server
//!
//! Serves large PDF documents over HTTP with byte-range (partial content)
//! support, so a viewer can render a linearized document incrementally
//! without downloading it in full.
//!
//! The streaming engine is generic: any type implementing both [`AsyncRead`]
//! and [`AsyncSeekStart`] can be served through the [`KnownSize`] adapter
//! and the [`Ranged`] responder. [`AsyncSeekStart`] is [`AsyncSeek`]
//! narrowed to seeking from the start of the stream, and is automatically
//! implemented for any [`AsyncSeek`].
//!
//! ```
//! use std::io::Cursor;
//! use linear_pdf_server::{KnownSize, Ranged};
//!
//! let bytes = b"%PDF-1.5\nhello".to_vec();
//! let size = bytes.len() as u64;
//! let body = KnownSize::sized(Cursor::new(bytes), size);
//!
//! // a seekable document and a range header produce a 206 response
//! let ranged = Ranged::new(Some("bytes=0-4".to_string()), true, body);
//! assert!(ranged.try_respond().is_ok());
//! ```
//!
//! Range interpretation follows the server's documented policy rather than
//! the full RFC 9110 grammar: a single `bytes=<start>-<end>` span (either
//! bound may be clamped against the file), open-ended `bytes=<start>-`, and
//! a deliberate fallback to a full 200 response for anything else —
//! malformed headers, suffix-length requests, or documents that are not
//! linearized. A syntactically valid window starting beyond the end of the
//! file is the one hard failure, answered with 416.

pub mod config;
pub mod error;
mod file;
pub mod linear;
pub mod range;
pub mod routes;
pub mod store;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{ContentLength, ContentRange};
use axum_extra::TypedHeader;
use tokio::io::{AsyncRead, AsyncSeek};

pub use file::KnownSize;
pub use linear::{Linearizer, QpdfLinearizer};
pub use range::{ByteWindow, RangeOutcome};
pub use routes::{router, AppState};
pub use store::{DirStore, DocumentStore};
pub use stream::{ChunkStream, CHUNK_SIZE};

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

/// The main responder type. Implements [`IntoResponse`].
///
/// Holds the raw `Range` header value (if any), whether the document
/// supports partial delivery, and the body to stream from.
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: Option<String>,
    seekable: bool,
    body: B,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`].
    ///
    /// When `seekable` is false the range header is ignored entirely and the
    /// response is always full content.
    pub fn new(range: Option<String>, seekable: bool, body: B) -> Self {
        Ranged { range, seekable, body }
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`]. Returns [`RangeNotSatisfiable`] if the requested
    /// window starts beyond the end of the file.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeNotSatisfiable> {
        let total_bytes = self.body.byte_size();

        let header = if self.seekable { self.range.as_deref() } else { None };

        match range::interpret(header, total_bytes) {
            RangeOutcome::Resolved(window) => {
                let content_range = ContentRange::bytes(window.start..window.end + 1, total_bytes)
                    .expect("ContentRange::bytes cannot panic in this usage");
                let content_length = ContentLength(window.len());
                let stream = ChunkStream::new(self.body, window.start, window.len());
                Ok(RangedResponse::Partial { content_range, content_length, stream })
            }
            RangeOutcome::Fallback => {
                let content_length = ContentLength(total_bytes);
                let stream = ChunkStream::new(self.body, 0, total_bytes);
                Ok(RangedResponse::Full { content_length, stream })
            }
            RangeOutcome::Unsatisfiable => {
                Err(RangeNotSatisfiable(ContentRange::unsatisfied_bytes(total_bytes)))
            }
        }
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Error type indicating that the requested range was not satisfiable. Implements [`IntoResponse`].
#[derive(Debug, Clone)]
pub struct RangeNotSatisfiable(pub ContentRange);

impl IntoResponse for RangeNotSatisfiable {
    fn into_response(self) -> Response {
        let status = StatusCode::RANGE_NOT_SATISFIABLE;
        let header = TypedHeader(self.0);
        (status, header, ()).into_response()
    }
}

/// Data type containing computed headers and body for a range response. Implements [`IntoResponse`].
#[derive(Debug)]
pub enum RangedResponse<B> {
    /// Full content, status 200. Sent when no usable range input exists.
    Full {
        content_length: ContentLength,
        stream: ChunkStream<B>,
    },
    /// One byte window, status 206.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: ChunkStream<B>,
    },
}

/// Headers common to 200 and 206 responses: range advertisement, the PDF
/// content type, and cache-busting so viewers always see the current bytes.
fn base_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (ACCEPT_RANGES, HeaderValue::from_static("bytes")),
        (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
        (CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate")),
        (PRAGMA, HeaderValue::from_static("no-cache")),
        (EXPIRES, HeaderValue::from_static("0")),
    ]
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        match self {
            RangedResponse::Full { content_length, stream } => (
                StatusCode::OK,
                base_headers(),
                TypedHeader(content_length),
                stream,
            )
                .into_response(),
            RangedResponse::Partial { content_range, content_length, stream } => (
                StatusCode::PARTIAL_CONTENT,
                base_headers(),
                TypedHeader(content_range),
                TypedHeader(content_length),
                stream,
            )
                .into_response(),
        }
    }
}
