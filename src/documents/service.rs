//! Service coordinating the uploads directory, the two stores, and the inference adapter.

use crate::{
    config::{Config, MetadataWriteMode},
    documents::types::{GatewayError, IndexUpload, UploadOutcome, UploadRequest},
    inference::InferenceClient,
    storage::{DocumentMap, IndexArtifactStore, MetadataStore, StorageError, StoragePaths},
};
use std::sync::Arc;

/// Fixed reply of the liveness endpoint.
pub const GREETING: &str = "hello Marcella, how is your day going \n";

/// Owns the on-disk layout and the shared inference handle.
///
/// Built once at startup and shared by every handler through an `Arc`. Nothing here locks:
/// two concurrent uploads or index pushes race on the same files and the last writer wins.
pub struct DocumentService {
    paths: StoragePaths,
    metadata: MetadataStore,
    index: IndexArtifactStore,
    inference: Arc<dyn InferenceClient>,
    upload_prompt: String,
    metadata_mode: MetadataWriteMode,
}

impl DocumentService {
    /// Service over `paths` using default prompt, replace-mode metadata, and no dimension check.
    pub fn new(paths: StoragePaths, inference: Arc<dyn InferenceClient>) -> Self {
        let defaults = Config::default();
        Self {
            metadata: MetadataStore::new(paths.metadata_file()),
            index: IndexArtifactStore::new(paths.index_file(), None),
            paths,
            inference,
            upload_prompt: defaults.upload_prompt,
            metadata_mode: defaults.metadata_write_mode,
        }
    }

    /// Build the service described by `config` and create the uploads directory.
    pub async fn from_config(
        config: &Config,
        inference: Arc<dyn InferenceClient>,
    ) -> Result<Self, StorageError> {
        let paths = StoragePaths::from_config(config);
        paths.ensure().await?;
        Ok(Self::new(paths, inference)
            .with_upload_prompt(config.upload_prompt.clone())
            .with_metadata_mode(config.metadata_write_mode)
            .with_index_dimension(config.index_dimension))
    }

    /// Replace the default question asked after each upload.
    pub fn with_upload_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.upload_prompt = prompt.into();
        self
    }

    /// Choose how uploads are recorded in the metadata store.
    pub fn with_metadata_mode(mut self, mode: MetadataWriteMode) -> Self {
        self.metadata_mode = mode;
        self
    }

    /// Require pushed indexes to declare this dimension.
    pub fn with_index_dimension(mut self, dimension: Option<u32>) -> Self {
        self.index = IndexArtifactStore::new(self.paths.index_file(), dimension);
        self
    }

    /// On-disk layout used by this service.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Return the stored index artifact.
    pub async fn load_index(&self) -> Result<Vec<u8>, GatewayError> {
        if !self.index.exists().await {
            return Err(StorageError::NotFound(self.index.path().to_path_buf()).into());
        }
        Ok(self.index.read().await?)
    }

    /// Replace the index artifact, then re-open it to make sure it is a readable index.
    pub async fn store_index(&self, bytes: &[u8]) -> Result<IndexUpload, GatewayError> {
        self.paths.ensure().await?;
        self.index.write(bytes).await?;
        let header = self.index.reopen().await?;
        Ok(IndexUpload {
            header,
            bytes: bytes.len(),
        })
    }

    /// Return the full metadata mapping.
    pub async fn load_metadata(&self) -> Result<DocumentMap, GatewayError> {
        Ok(self.metadata.load().await?)
    }

    /// Read a stored document addressed by a client-supplied path.
    pub async fn read_document(&self, requested: &str) -> Result<Vec<u8>, GatewayError> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(GatewayError::MissingInput("No file path provided".into()));
        }
        let path = self.paths.resolve_document(requested).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|err| StorageError::io(&path)(err).into())
    }

    /// Save an uploaded document, embed it remotely, record it, and ask about it.
    ///
    /// Remote failures abort the request after the file has been saved; the saved file is kept.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, GatewayError> {
        let UploadRequest {
            file_name,
            bytes,
            prompt,
        } = request;
        let stored_path = self
            .paths
            .document_path(&file_name)
            .map_err(|err| match err {
                StorageError::InvalidFileName(_) => {
                    GatewayError::MissingInput("No selected file".into())
                }
                other => other.into(),
            })?;

        self.paths.ensure().await?;
        tokio::fs::write(&stored_path, &bytes)
            .await
            .map_err(StorageError::io(&stored_path))?;
        tracing::info!(
            path = %stored_path.display(),
            bytes = bytes.len(),
            "Saved uploaded document"
        );

        let identifier = self.inference.embed(&stored_path).await?;
        tracing::debug!(identifier = %identifier, "Document embedded");

        let stored = stored_path.to_string_lossy();
        self.metadata
            .record(self.metadata_mode, &identifier, &stored)
            .await?;

        let question = prompt
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.upload_prompt.clone());
        let answer = self.inference.ask(&question).await?;
        tracing::info!(identifier = %identifier, question = %question, "Upload answered");

        Ok(UploadOutcome {
            identifier,
            stored_path,
            answer,
        })
    }
}
