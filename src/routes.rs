//! HTTP surface: upload, listing, and ranged document delivery.
//!
//! Handlers are generic over the storage and linearization seams so tests
//! can substitute an in-process linearizer and a scratch-directory store.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::ApiError;
use crate::linear::{probe_linearized, Linearizer};
use crate::store::{valid_name, DocumentStore, StoredDocument};
use crate::{KnownSize, Ranged};

/// Uploads above this size are rejected outright. Raised from axum's 2 MB
/// default; large scanned PDFs routinely exceed that.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

const LINEAR_PREFIX: &str = "linear_";
const ORIGINAL_PREFIX: &str = "original_";

/// Shared state handed to every request handler.
#[derive(Debug, Clone)]
pub struct AppState<S, L> {
    store: S,
    linearizer: L,
}

impl<S, L> AppState<S, L> {
    pub fn new(store: S, linearizer: L) -> Self {
        AppState { store, linearizer }
    }
}

/// Build the application router over any store and linearizer.
pub fn router<S, L>(state: AppState<S, L>) -> Router
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    L: Linearizer + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/upload", post(upload::<S, L>))
        .route("/files", get(list_files::<S, L>))
        .route("/pdf/{filename}", get(get_pdf::<S, L>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct UploadReceipt {
    filename: String,
    original_filename: String,
}

/// Accept a multipart PDF upload, store the original, and store its
/// linearized counterpart under the paired name.
///
/// The linearizer's output is only stored after it passes the
/// linearization check; a failed reorganization is a 500 and leaves no
/// partially linearized file behind.
#[tracing::instrument(skip_all)]
async fn upload<S, L>(
    State(state): State<AppState<S, L>>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, ApiError>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    L: Linearizer + Clone + Send + Sync + 'static,
{
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if let Some(name) = field.file_name().map(str::to_owned) {
            let bytes = field.bytes().await?;
            upload = Some((name, bytes));
            break;
        }
    }
    let (client_name, bytes) = upload.ok_or(ApiError::MissingFile)?;

    if !valid_name(&client_name) {
        return Err(ApiError::InvalidName(client_name));
    }

    let original_filename = format!("{ORIGINAL_PREFIX}{client_name}");
    let filename = format!("{LINEAR_PREFIX}{client_name}");

    state
        .store
        .put(&original_filename, &bytes)
        .await
        .map_err(|e| ApiError::from_io(&original_filename, e))?;

    let linearized = state.linearizer.linearize(&bytes).await?;
    state
        .store
        .put(&filename, &linearized)
        .await
        .map_err(|e| ApiError::from_io(&filename, e))?;

    tracing::info!(
        original = %original_filename,
        linear = %filename,
        bytes_in = bytes.len(),
        bytes_out = linearized.len(),
        "stored upload"
    );

    Ok(Json(UploadReceipt { filename, original_filename }))
}

#[derive(Debug, Serialize)]
struct FileEntry {
    name: String,
    size: u64,
    created: f64,
    is_linear: bool,
    pair_name: String,
}

/// The counterpart name under the `linear_`/`original_` pairing convention.
fn pair_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix(LINEAR_PREFIX) {
        format!("{ORIGINAL_PREFIX}{rest}")
    } else if let Some(rest) = name.strip_prefix(ORIGINAL_PREFIX) {
        format!("{LINEAR_PREFIX}{rest}")
    } else {
        // unprefixed files have no stored pair; report the name that a
        // linearized counterpart would take
        format!("{LINEAR_PREFIX}{name}")
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

impl From<StoredDocument> for FileEntry {
    fn from(doc: StoredDocument) -> Self {
        FileEntry {
            is_linear: doc.name.starts_with(LINEAR_PREFIX),
            pair_name: pair_name(&doc.name),
            created: epoch_seconds(doc.created),
            size: doc.size,
            name: doc.name,
        }
    }
}

/// List stored documents with their linearization pairing.
#[tracing::instrument(skip_all)]
async fn list_files<S, L>(
    State(state): State<AppState<S, L>>,
) -> Result<Json<Vec<FileEntry>>, ApiError>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    L: Linearizer + Clone + Send + Sync + 'static,
{
    let documents = state.store.list().await?;
    Ok(Json(documents.into_iter().map(FileEntry::from).collect()))
}

/// Serve a document, honouring a `Range` header when the stored bytes are
/// linearized.
///
/// Size and linearization state are read from storage on every request;
/// nothing is cached between requests.
#[tracing::instrument(skip_all, fields(filename = %filename))]
async fn get_pdf<S, L>(
    State(state): State<AppState<S, L>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError>
where
    S: DocumentStore + Clone + Send + Sync + 'static,
    L: Linearizer + Clone + Send + Sync + 'static,
{
    let size = state
        .store
        .size(&filename)
        .await
        .map_err(|e| ApiError::from_io(&filename, e))?;

    let seekable = if size == 0 {
        false
    } else {
        let mut probe = state
            .store
            .open(&filename)
            .await
            .map_err(|e| ApiError::from_io(&filename, e))?;
        probe_linearized(&mut probe).await?
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    tracing::debug!(size, seekable, range = range.as_deref(), "serving document");

    // fresh handle for the body; the probe consumed its own
    let reader = state
        .store
        .open(&filename)
        .await
        .map_err(|e| ApiError::from_io(&filename, e))?;
    let body = KnownSize::sized(reader, size);

    Ok(Ranged::new(range, seekable, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_name_swaps_prefixes() {
        assert_eq!("original_report.pdf", pair_name("linear_report.pdf"));
        assert_eq!("linear_report.pdf", pair_name("original_report.pdf"));
    }

    #[test]
    fn pair_name_for_unprefixed_file() {
        assert_eq!("linear_report.pdf", pair_name("report.pdf"));
    }

    #[test]
    fn entry_reports_linearity_from_prefix() {
        let entry = FileEntry::from(StoredDocument {
            name: "linear_a.pdf".into(),
            size: 10,
            created: UNIX_EPOCH,
        });
        assert!(entry.is_linear);
        assert_eq!("original_a.pdf", entry.pair_name);
        assert_eq!(0.0, entry.created);

        let entry = FileEntry::from(StoredDocument {
            name: "original_a.pdf".into(),
            size: 10,
            created: UNIX_EPOCH,
        });
        assert!(!entry.is_linear);
    }
}
