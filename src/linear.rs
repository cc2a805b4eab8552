//! The document reorganization collaborator.
//!
//! Linearization rewrites a PDF so a viewer can begin rendering from byte
//! ranges before the whole file has arrived. The server consumes it as an
//! opaque bytes→bytes function behind [`Linearizer`]; the one post-condition
//! it relies on is that the output passes [`is_linearized_head`]. Output
//! that fails the check is reported as an error and never stored.
//!
//! The read-time predicate works on raw bytes: a linearized PDF carries its
//! linearization parameter dictionary (the `/Linearized` key) within the
//! first 1024 bytes of the file, so probing the head is enough.

use std::future::Future;
use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// How many leading bytes the linearization probe inspects.
pub const HEAD_PROBE_LEN: usize = 1024;

/// Errors from the reorganization step.
#[derive(Debug, Error)]
pub enum LinearizeError {
    #[error("i/o failure during linearization: {0}")]
    Io(#[from] io::Error),

    #[error("linearization tool failed ({status}): {stderr}")]
    Tool { status: String, stderr: String },

    #[error("linearization produced output that is not linearized")]
    Unverified,
}

/// Opaque document reorganization function.
///
/// Implementations take the original document bytes and return a
/// byte-equivalent document whose layout permits incremental loading. The
/// returned bytes must satisfy [`is_linearized_head`]; [`QpdfLinearizer`]
/// verifies this before returning, and test doubles are expected to as well.
pub trait Linearizer {
    fn linearize(&self, input: &[u8]) -> impl Future<Output = Result<Vec<u8>, LinearizeError>> + Send;
}

/// Does this document head belong to a linearized PDF?
pub fn is_linearized_head(head: &[u8]) -> bool {
    let head = &head[..head.len().min(HEAD_PROBE_LEN)];
    head.starts_with(b"%PDF-") && head.windows(11).any(|w| w == b"/Linearized")
}

/// Probe a fresh reader for the linearization marker.
///
/// Reads at most [`HEAD_PROBE_LEN`] bytes; the reader is consumed, callers
/// open another handle for streaming.
pub async fn probe_linearized<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<bool> {
    let mut head = [0u8; HEAD_PROBE_LEN];
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(is_linearized_head(&head[..filled]))
}

/// [`Linearizer`] backed by the `qpdf` command-line tool.
///
/// Input and output go through a scratch directory because qpdf operates on
/// files; the store itself never needs to expose filesystem paths.
#[derive(Debug, Clone)]
pub struct QpdfLinearizer {
    bin: String,
}

impl QpdfLinearizer {
    pub fn new(bin: impl Into<String>) -> Self {
        QpdfLinearizer { bin: bin.into() }
    }

    async fn run(&self, input: &[u8]) -> Result<Vec<u8>, LinearizeError> {
        let scratch = tempfile::tempdir()?;
        let src = scratch.path().join("input.pdf");
        let dst = scratch.path().join("linear.pdf");
        tokio::fs::write(&src, input).await?;

        let output = Command::new(&self.bin)
            .arg("--linearize")
            .arg("--object-streams=generate")
            .arg(&src)
            .arg(&dst)
            .stdin(Stdio::null())
            .output()
            .await?;

        // qpdf exits 3 on warnings but still writes valid output
        if !matches!(output.status.code(), Some(0 | 3)) {
            return Err(LinearizeError::Tool {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let bytes = tokio::fs::read(&dst).await?;
        if !is_linearized_head(&bytes) {
            return Err(LinearizeError::Unverified);
        }
        Ok(bytes)
    }
}

impl Linearizer for QpdfLinearizer {
    fn linearize(&self, input: &[u8]) -> impl Future<Output = Result<Vec<u8>, LinearizeError>> + Send {
        self.run(input)
    }
}
