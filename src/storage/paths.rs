//! Fixed on-disk layout: one uploads directory holding documents, the index, and the metadata.

use crate::config::Config;
use crate::storage::types::StorageError;
use std::path::{Path, PathBuf};

/// Resolved locations used by the stores and the document handlers.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    documents_dir: PathBuf,
    index_file: PathBuf,
    metadata_file: PathBuf,
}

impl StoragePaths {
    /// Lay out the index and metadata files inside `documents_dir`.
    pub fn new(
        documents_dir: impl Into<PathBuf>,
        index_file_name: &str,
        metadata_file_name: &str,
    ) -> Self {
        let documents_dir = documents_dir.into();
        Self {
            index_file: documents_dir.join(index_file_name),
            metadata_file: documents_dir.join(metadata_file_name),
            documents_dir,
        }
    }

    /// Build the layout described by the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.documents_dir.clone(),
            &config.index_file_name,
            &config.metadata_file_name,
        )
    }

    /// Directory receiving uploaded documents.
    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Location of the index artifact.
    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    /// Location of the metadata mapping.
    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Create the uploads directory if it is missing.
    pub async fn ensure(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.documents_dir)
            .await
            .map_err(StorageError::io(&self.documents_dir))?;
        tracing::debug!(dir = %self.documents_dir.display(), "Uploads directory ready");
        Ok(())
    }

    /// Destination for an uploaded file, keyed by the final component of the client's name.
    ///
    /// Directory parts (either separator style) are dropped so uploads always land directly in
    /// the uploads directory. Names that would land on the index or metadata file are refused.
    pub fn document_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let base = file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();
        if base.is_empty() || base == "." || base == ".." {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }
        let target = self.documents_dir.join(base);
        if target == self.index_file || target == self.metadata_file {
            return Err(StorageError::ReservedFileName(base.to_string()));
        }
        Ok(target)
    }

    /// Resolve a client-supplied path to an existing file inside the uploads directory.
    ///
    /// Relative paths are tried against the uploads directory first and then as given, so both
    /// a bare `name.pdf` and the stored `Documents/name.pdf` form resolve. The first existing
    /// candidate inside the uploads directory wins; candidates that exist only outside it are
    /// refused.
    pub async fn resolve_document(&self, requested: &str) -> Result<PathBuf, StorageError> {
        let as_given = PathBuf::from(requested);
        let mut candidates = Vec::with_capacity(2);
        if as_given.is_relative() {
            candidates.push(self.documents_dir.join(requested));
        }
        candidates.push(as_given.clone());

        let mut escaped = None;
        for candidate in candidates {
            if !path_exists(&candidate).await {
                continue;
            }
            let resolved = tokio::fs::canonicalize(&candidate)
                .await
                .map_err(StorageError::io(&candidate))?;
            let root = tokio::fs::canonicalize(&self.documents_dir)
                .await
                .map_err(StorageError::io(&self.documents_dir))?;
            if !resolved.starts_with(&root) {
                escaped.get_or_insert((candidate, resolved));
                continue;
            }
            if !resolved.is_file() {
                return Err(StorageError::NotFound(candidate));
            }
            return Ok(resolved);
        }

        match escaped {
            Some((candidate, resolved)) => {
                tracing::warn!(
                    requested,
                    resolved = %resolved.display(),
                    "Rejected document path outside uploads directory"
                );
                Err(StorageError::OutsideUploads(candidate))
            }
            None => Err(StorageError::NotFound(as_given)),
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::scratch_dir;

    fn layout() -> StoragePaths {
        StoragePaths::new(scratch_dir().join("Documents"), "index.bin", "meta.json")
    }

    #[test]
    fn index_and_metadata_live_inside_documents_dir() {
        let paths = StoragePaths::new("Documents", "faiss_index.bin", "metadata.json");
        assert_eq!(paths.index_file(), Path::new("Documents/faiss_index.bin"));
        assert_eq!(paths.metadata_file(), Path::new("Documents/metadata.json"));
    }

    #[test]
    fn document_path_strips_directories() {
        let paths = StoragePaths::new("Documents", "i", "m");
        assert_eq!(
            paths.document_path("report.pdf").expect("plain name"),
            PathBuf::from("Documents/report.pdf")
        );
        assert_eq!(
            paths.document_path("../../etc/passwd").expect("traversal name"),
            PathBuf::from("Documents/passwd")
        );
        assert_eq!(
            paths.document_path("C:\\Users\\me\\notes.pdf").expect("windows name"),
            PathBuf::from("Documents/notes.pdf")
        );
    }

    #[test]
    fn document_path_rejects_names_without_a_file_component() {
        let paths = StoragePaths::new("Documents", "i", "m");
        for name in ["", "   ", "dir/", "..", "a/.."] {
            assert!(
                matches!(
                    paths.document_path(name),
                    Err(StorageError::InvalidFileName(_))
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn resolve_document_accepts_stored_and_bare_paths() {
        let paths = layout();
        paths.ensure().await.expect("ensure");
        let stored = paths.document_path("doc.pdf").expect("path");
        tokio::fs::write(&stored, b"%PDF-1.4").await.expect("write");

        let by_stored = paths
            .resolve_document(&stored.to_string_lossy())
            .await
            .expect("stored path resolves");
        let by_name = paths
            .resolve_document("doc.pdf")
            .await
            .expect("bare name resolves");
        assert_eq!(by_stored, by_name);
    }

    #[test]
    fn document_path_refuses_store_file_names() {
        let paths = StoragePaths::new("Documents", "faiss_index.bin", "metadata.json");
        for name in ["metadata.json", "faiss_index.bin", "../x/metadata.json"] {
            assert!(
                matches!(
                    paths.document_path(name),
                    Err(StorageError::ReservedFileName(_))
                ),
                "{name:?} should be refused"
            );
        }
        assert!(paths.document_path("metadata.json.pdf").is_ok());
    }

    #[tokio::test]
    async fn resolve_document_prefers_uploads_dir_over_working_dir() {
        // Tests run from the package root, which holds its own Cargo.toml.
        assert!(Path::new("Cargo.toml").exists());
        let paths = layout();
        paths.ensure().await.expect("ensure");
        let stored = paths.documents_dir().join("Cargo.toml");
        tokio::fs::write(&stored, b"%PDF-1.4 uploaded").await.expect("write");

        let resolved = paths
            .resolve_document("Cargo.toml")
            .await
            .expect("uploaded copy resolves");
        assert_eq!(
            resolved,
            tokio::fs::canonicalize(&stored).await.expect("canonical")
        );
        assert_eq!(
            tokio::fs::read(&resolved).await.expect("read"),
            b"%PDF-1.4 uploaded"
        );
    }

    #[tokio::test]
    async fn resolve_document_refuses_working_dir_files_missing_from_uploads() {
        let paths = layout();
        paths.ensure().await.expect("ensure");
        assert!(matches!(
            paths.resolve_document("Cargo.toml").await,
            Err(StorageError::OutsideUploads(_))
        ));
    }

    #[tokio::test]
    async fn resolve_document_reports_missing_and_escaping_paths() {
        let paths = layout();
        paths.ensure().await.expect("ensure");
        let outside = paths.documents_dir().parent().expect("parent").join("secret.txt");
        tokio::fs::write(&outside, b"secret").await.expect("write");

        assert!(matches!(
            paths.resolve_document("missing.pdf").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            paths.resolve_document("../secret.txt").await,
            Err(StorageError::OutsideUploads(_))
        ));
        assert!(matches!(
            paths.resolve_document(&outside.to_string_lossy()).await,
            Err(StorageError::OutsideUploads(_))
        ));
    }
}
