//! Request, outcome, and error types for the document workflows.

use crate::inference::InferenceError;
use crate::storage::{IndexHeader, StorageError};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the HTTP layer.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required form field or query parameter was absent or empty.
    #[error("{0}")]
    MissingInput(String),
    /// Local persistence failed or the referenced file is absent.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The inference service could not complete a call.
    #[error("Inference service failed: {0}")]
    Remote(#[from] InferenceError),
}

/// A document received from a client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// File name as sent by the client.
    pub file_name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Question to ask instead of the default prompt.
    pub prompt: Option<String>,
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// Identifier the inference service assigned to the document.
    pub identifier: String,
    /// Where the document was written.
    pub stored_path: PathBuf,
    /// Answer to the prompt asked after embedding, as produced by the service.
    pub answer: Value,
}

/// Result of replacing the index artifact.
#[derive(Debug, Clone)]
pub struct IndexUpload {
    /// Header read back from the stored index.
    pub header: IndexHeader,
    /// Size of the stored blob.
    pub bytes: usize,
}
