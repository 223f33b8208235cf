//! In-process stand-in for the remote Space used by unit tests.

use crate::inference::{InferenceClient, InferenceError};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-process stand-in for the remote Space that hands out sequential identifiers.
#[derive(Default)]
pub(crate) struct StubInference {
    pub(crate) embedded: Mutex<Vec<PathBuf>>,
    pub(crate) questions: Mutex<Vec<String>>,
    pub(crate) fail_embed: bool,
    pub(crate) answer: Option<Value>,
}

#[async_trait]
impl InferenceClient for StubInference {
    async fn echo(&self, text: &str) -> Result<String, InferenceError> {
        Ok(text.to_string())
    }

    async fn embed(&self, file: &Path) -> Result<String, InferenceError> {
        if self.fail_embed {
            return Err(InferenceError::Remote("space is sleeping".into()));
        }
        let mut embedded = self.embedded.lock().expect("lock");
        embedded.push(file.to_path_buf());
        Ok((embedded.len() - 1).to_string())
    }

    async fn ask(&self, question: &str) -> Result<Value, InferenceError> {
        self.questions
            .lock()
            .expect("lock")
            .push(question.to_string());
        Ok(self
            .answer
            .clone()
            .unwrap_or_else(|| Value::String(format!("answer to: {question}"))))
    }
}
