//! Range header interpretation and window clamping.
//!
//! A `Range` header is turned into a [`RangeOutcome`] in two steps:
//! [`parse`] extracts the raw `bytes=<start>-<end>` pair without looking at
//! the file, and [`resolve`] clamps it against the file's current size.
//! [`interpret`] combines both and is the only entry point the responder
//! uses.
//!
//! A header that cannot be parsed is never an error: the request falls back
//! to a full-content response. Only a window that is syntactically valid but
//! lies entirely beyond the file is rejected, with 416.

/// A parsed but not yet validated byte range. `end` is `None` for the
/// open-ended `bytes=<start>-` form and is filled in from the file size
/// during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawWindow {
    pub start: u64,
    pub end: Option<u64>,
}

/// An in-bounds byte span, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
}

impl ByteWindow {
    /// Number of bytes covered by the window. Never zero: both ends are
    /// inclusive and resolution rejects inverted windows.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Result of interpreting a request's range input against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// A valid window; respond with 206 over exactly these bytes.
    Resolved(ByteWindow),
    /// No usable range input; respond with the full file and 200.
    Fallback,
    /// The requested start lies beyond the end of the file; respond 416.
    Unsatisfiable,
}

/// Parse the raw value of a `Range` header into a [`RawWindow`].
///
/// Only the single-range `bytes=<start>-<end>` and `bytes=<start>-` forms
/// are supported. The suffix-length form `bytes=-<n>` is deliberately not:
/// it parses as a failure and the caller falls back to a full response.
/// Returns `None` on any malformed input.
pub fn parse(raw: &str) -> Option<RawWindow> {
    let spec = raw.strip_prefix("bytes=")?;
    let (left, right) = spec.split_once('-')?;
    if right.contains('-') {
        // more than one dash: multi-range or garbage
        return None;
    }
    if left.is_empty() {
        // suffix-length form, unsupported
        return None;
    }
    let start = left.parse::<u64>().ok()?;
    let end = if right.is_empty() {
        None
    } else {
        Some(right.parse::<u64>().ok()?)
    };
    Some(RawWindow { start, end })
}

/// Clamp a [`RawWindow`] against the true file size.
///
/// An absent end resolves to `size - 1`; a present end is clamped to
/// `size - 1`. If the clamped window is inverted (the requested start lies
/// past the last byte) the range is unsatisfiable. Callers must ensure
/// `size > 0`; empty files never reach resolution.
pub fn resolve(raw: RawWindow, size: u64) -> RangeOutcome {
    debug_assert!(size > 0);
    let start = raw.start;
    let end = raw.end.map_or(size - 1, |end| end.min(size - 1));
    if end < start {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Resolved(ByteWindow { start, end })
}

/// Interpret an optional raw `Range` header against a file of `size` bytes.
pub fn interpret(header: Option<&str>, size: u64) -> RangeOutcome {
    if size == 0 {
        // an empty file is served as a full empty response, never a range
        return RangeOutcome::Fallback;
    }
    let Some(raw) = header else {
        return RangeOutcome::Fallback;
    };
    let Some(window) = parse(raw) else {
        tracing::debug!(header = raw, "unparsable range header, serving full content");
        return RangeOutcome::Fallback;
    };
    resolve(window, size)
}
