//! JSON mapping from document identifier to the stored file path.

use crate::config::MetadataWriteMode;
use crate::storage::types::{StorageError, write_whole};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Identifier → stored path, serialized as a flat JSON object.
pub type DocumentMap = BTreeMap<String, String>;

/// Whole-file store for document records.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    /// Store backed by the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the full mapping.
    pub async fn load(&self) -> Result<DocumentMap, StorageError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(StorageError::io(&self.path))?;
        serde_json::from_slice(&raw).map_err(|err| StorageError::Malformed {
            path: self.path.clone(),
            reason: err.to_string(),
        })
    }

    /// Overwrite the store with a mapping holding only this record.
    pub async fn replace(&self, identifier: &str, path: &str) -> Result<DocumentMap, StorageError> {
        let mapping = DocumentMap::from([(identifier.to_string(), path.to_string())]);
        self.persist(&mapping).await?;
        Ok(mapping)
    }

    /// Merge this record into the existing mapping, creating the store when absent.
    pub async fn upsert(&self, identifier: &str, path: &str) -> Result<DocumentMap, StorageError> {
        let mut mapping = match self.load().await {
            Ok(mapping) => mapping,
            Err(StorageError::NotFound(_)) => DocumentMap::new(),
            Err(err) => return Err(err),
        };
        mapping.insert(identifier.to_string(), path.to_string());
        self.persist(&mapping).await?;
        Ok(mapping)
    }

    /// Write a record using the configured strategy.
    pub async fn record(
        &self,
        mode: MetadataWriteMode,
        identifier: &str,
        path: &str,
    ) -> Result<DocumentMap, StorageError> {
        let mapping = match mode {
            MetadataWriteMode::Replace => self.replace(identifier, path).await?,
            MetadataWriteMode::Merge => self.upsert(identifier, path).await?,
        };
        tracing::info!(
            identifier,
            path,
            mode = ?mode,
            records = mapping.len(),
            "Saved metadata"
        );
        Ok(mapping)
    }

    async fn persist(&self, mapping: &DocumentMap) -> Result<(), StorageError> {
        let body = serde_json::to_vec(mapping).map_err(|err| StorageError::Malformed {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        write_whole(&self.path, &body).await
    }
}
