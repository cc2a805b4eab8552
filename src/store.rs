//! Write-once, read-many document storage keyed by name.
//!
//! The streaming core never touches storage directly; handlers go through
//! [`DocumentStore`], so the directory-backed [`DirStore`] can be swapped
//! for any blob store without changing the range logic. Documents are
//! written once at upload time and never modified in place.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::AsyncSeekStart;

/// A stored document as reported by [`DocumentStore::list`].
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub name: String,
    pub size: u64,
    pub created: SystemTime,
}

/// Interface to the key→bytes store.
///
/// Futures are required to be `Send` so implementations can be used from
/// concurrently running request handlers.
pub trait DocumentStore {
    /// Reader over a stored document. Each call to [`open`](Self::open)
    /// yields a fresh handle; readers are never shared between requests.
    type Reader: AsyncRead + AsyncSeekStart + Unpin + Send + 'static;

    /// Store `bytes` under `name`, replacing any previous content.
    fn put(&self, name: &str, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Current on-disk size of the named document. Read per request, never
    /// cached.
    fn size(&self, name: &str) -> impl Future<Output = io::Result<u64>> + Send;

    /// Open a fresh reader over the named document.
    fn open(&self, name: &str) -> impl Future<Output = io::Result<Self::Reader>> + Send;

    /// All stored `.pdf` documents, sorted by name.
    fn list(&self) -> impl Future<Output = io::Result<Vec<StoredDocument>>> + Send;
}

/// Is `name` acceptable as a storage key?
///
/// Names come straight from clients; anything that could escape the storage
/// directory or confuse the pairing convention is rejected up front.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && !name.contains('\0')
        && name.to_ascii_lowercase().ends_with(".pdf")
}

/// Flat directory store: one file per document, named by its storage key.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if it does not exist yet.
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    fn checked_path(&self, name: &str) -> io::Result<PathBuf> {
        if !valid_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid document name: {name:?}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

impl DocumentStore for DirStore {
    type Reader = tokio::fs::File;

    fn put(&self, name: &str, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        let path = self.checked_path(name);
        async move {
            let mut file = tokio::fs::File::create(path?).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            Ok(())
        }
    }

    fn size(&self, name: &str) -> impl Future<Output = io::Result<u64>> + Send {
        let path = self.checked_path(name);
        async move { Ok(tokio::fs::metadata(path?).await?.len()) }
    }

    fn open(&self, name: &str) -> impl Future<Output = io::Result<Self::Reader>> + Send {
        let path = self.checked_path(name);
        async move { tokio::fs::File::open(path?).await }
    }

    fn list(&self) -> impl Future<Output = io::Result<Vec<StoredDocument>>> + Send {
        let root = self.root.clone();
        async move {
            let mut documents = Vec::new();
            let mut entries = tokio::fs::read_dir(&root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(_) => continue,
                };
                if !name.to_ascii_lowercase().ends_with(".pdf") {
                    continue;
                }
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }
                // created() is unsupported on some filesystems
                let created = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                documents.push(StoredDocument { name, size: metadata.len(), created });
            }
            documents.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(documents)
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    fn store() -> (tempfile::TempDir, DirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn name_validation() {
        assert!(valid_name("linear_report.pdf"));
        assert!(valid_name("original_a.PDF"));
        assert!(!valid_name(""));
        assert!(!valid_name("report"));
        assert!(!valid_name("../etc/passwd.pdf"));
        assert!(!valid_name("a/b.pdf"));
        assert!(!valid_name("a\\b.pdf"));
        assert!(!valid_name(&"x".repeat(300)));
    }

    #[tokio::test]
    async fn put_then_read_back() {
        let (_dir, store) = store();
        store.put("original_doc.pdf", b"%PDF-1.5 content").await.unwrap();

        assert_eq!(16, store.size("original_doc.pdf").await.unwrap());

        let mut reader = store.open("original_doc.pdf").await.unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(b"%PDF-1.5 content", &bytes[..]);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let (_dir, store) = store();
        let err = store.size("linear_absent.pdf").await.unwrap_err();
        assert_eq!(io::ErrorKind::NotFound, err.kind());
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let (_dir, store) = store();
        let err = store.put("../escape.pdf", b"x").await.unwrap_err();
        assert_eq!(io::ErrorKind::InvalidInput, err.kind());
    }

    #[tokio::test]
    async fn list_reports_pdf_files_only() {
        let (_dir, store) = store();
        store.put("linear_b.pdf", b"bb").await.unwrap();
        store.put("original_a.pdf", b"a").await.unwrap();
        tokio::fs::write(store.root().join("notes.txt"), b"skip me").await.unwrap();

        let documents = store.list().await.unwrap();
        let names: Vec<_> = documents.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(vec!["linear_b.pdf", "original_a.pdf"], names);
        assert_eq!(2, documents[0].size);
        assert_eq!(1, documents[1].size);
    }
}
