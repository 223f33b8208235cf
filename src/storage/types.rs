//! Error type and small filesystem helpers shared by the storage components.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the on-disk stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The referenced file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Stored content could not be parsed.
    #[error("Malformed content in {}: {reason}", path.display())]
    Malformed {
        /// File holding the unreadable content.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },
    /// A requested path resolved outside the uploads directory.
    #[error("Path is outside the uploads directory: {}", .0.display())]
    OutsideUploads(PathBuf),
    /// A client-supplied file name has no usable final component.
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
    /// A client-supplied file name collides with the index or metadata file.
    #[error("File name is reserved: {0:?}")]
    ReservedFileName(String),
    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failing operation.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| {
            if source.kind() == io::ErrorKind::NotFound {
                Self::NotFound(path.to_path_buf())
            } else {
                Self::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        }
    }
}

/// Replace `path` with `bytes` in one step by writing a sibling temp file and renaming it.
pub(crate) async fn write_whole(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&staging, bytes)
        .await
        .map_err(StorageError::io(&staging))?;
    if let Err(source) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
