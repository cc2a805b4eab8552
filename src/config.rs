//! Environment-driven configuration.
//!
//! All knobs have defaults suitable for the container deployment; local
//! runs override them via environment variables or a `.env` file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Runtime configuration for the server binary.
///
/// | Variable | Default |
/// |---|---|
/// | `PDF_BIND_ADDR` | `0.0.0.0:8000` |
/// | `PDF_STORAGE_DIR` | `/pdf_storage` |
/// | `PDF_CORS_ORIGIN` | `http://localhost:3000` |
/// | `QPDF_BIN` | `qpdf` |
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub cors_origin: String,
    pub qpdf_bin: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_or("PDF_BIND_ADDR", "0.0.0.0:8000")
            .parse()
            .context("PDF_BIND_ADDR is not a valid socket address")?;
        Ok(Config {
            bind_addr,
            storage_dir: PathBuf::from(env_or("PDF_STORAGE_DIR", "/pdf_storage")),
            cors_origin: env_or("PDF_CORS_ORIGIN", "http://localhost:3000"),
            qpdf_bin: env_or("QPDF_BIN", "qpdf"),
        })
    }
}
