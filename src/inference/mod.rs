//! Client adapter for the hosted inference Space.

mod gradio;
#[cfg(test)]
pub(crate) mod stub;

pub use gradio::{FileData, GradioClient, space_base_url};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Errors raised while talking to the inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid inference URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service responded with an unexpected status code.
    #[error("Unexpected inference response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The service answered but the payload did not follow the expected protocol.
    #[error("Inference protocol error: {0}")]
    Protocol(String),
    /// The remote function itself reported a failure.
    #[error("Remote prediction failed: {0}")]
    Remote(String),
    /// A local file could not be read for upload.
    #[error("Failed to read {path}: {source}")]
    File {
        /// File that was going to be uploaded.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Operations exposed by the remote document model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Round-trip `text` through the service; used as a liveness probe.
    async fn echo(&self, text: &str) -> Result<String, InferenceError>;

    /// Upload a local document and return the identifier the service assigns to its embedding.
    async fn embed(&self, file: &Path) -> Result<String, InferenceError>;

    /// Ask a free-text question about the embedded documents.
    ///
    /// The prediction is returned as the service produced it, which is usually a string.
    async fn ask(&self, question: &str) -> Result<Value, InferenceError>;
}

/// Render a prediction value as text: strings verbatim, anything else as compact JSON.
pub fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_to_text_keeps_strings_and_serializes_the_rest() {
        assert_eq!(value_to_text(json!("doc-7")), "doc-7");
        assert_eq!(value_to_text(json!(3)), "3");
        assert_eq!(value_to_text(json!([1, 2])), "[1,2]");
        assert_eq!(value_to_text(Value::Null), "");
    }
}
