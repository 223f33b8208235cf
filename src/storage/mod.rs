//! Local persistence: the uploads directory, the metadata mapping, and the index artifact.

pub mod index;
pub mod metadata;
pub mod paths;
pub mod types;

pub use index::{IndexArtifactStore, IndexHeader, MetricKind};
pub use metadata::{DocumentMap, MetadataStore};
pub use paths::StoragePaths;
pub use types::StorageError;

#[cfg(test)]
pub(crate) fn scratch_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("doc-gateway-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
