//! Opaque FAISS index blob kept on disk and handed back and forth whole.
//!
//! The gateway never interprets the vectors. It only reads the fixed header FAISS writes at the
//! start of every serialized index so that a corrupt or mismatched upload fails loudly instead of
//! being served to the next reader.

use crate::storage::types::{StorageError, write_whole};
use std::fmt;
use std::path::{Path, PathBuf};

/// Fields read from the header of a serialized FAISS index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    /// Four-character type code (`IxF2`, `IHNf`, `IwFl`, ...).
    pub kind: String,
    /// Vector dimension (bits for binary indexes).
    pub dimension: u32,
    /// Number of stored vectors.
    pub total_vectors: u64,
    /// Whether the index finished training before it was written.
    pub is_trained: bool,
    /// Distance metric declared by the index.
    pub metric: MetricKind,
}

/// Distance metric codes used by FAISS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricKind {
    /// `METRIC_INNER_PRODUCT`
    InnerProduct,
    /// `METRIC_L2`
    L2,
    /// Any other metric, with its argument when the format carries one.
    Other {
        /// Raw metric code.
        code: i32,
        /// Metric argument (e.g. the `p` of `METRIC_Lp`).
        arg: Option<f32>,
    },
}

impl fmt::Display for IndexHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} d={} ntotal={}",
            self.kind, self.dimension, self.total_vectors
        )
    }
}

impl IndexHeader {
    /// Parse the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = HeaderReader { bytes, offset: 0 };
        let code = reader.take::<4>()?;
        if !code.iter().all(u8::is_ascii_alphanumeric) {
            return Err(format!("unknown index type code {code:02x?}"));
        }
        let kind = String::from_utf8_lossy(&code).into_owned();

        let dimension;
        let total;
        let trained;
        let metric_code;
        let mut metric_arg = None;
        if kind.starts_with("IB") {
            dimension = reader.i32()?;
            let _code_size = reader.i32()?;
            total = reader.i64()?;
            trained = reader.u8()?;
            metric_code = reader.i32()?;
        } else {
            dimension = reader.i32()?;
            total = reader.i64()?;
            let _ = (reader.i64()?, reader.i64()?);
            trained = reader.u8()?;
            metric_code = reader.i32()?;
            if metric_code > 1 {
                metric_arg = Some(reader.f32()?);
            }
        }

        let dimension = u32::try_from(dimension)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| format!("invalid dimension {dimension}"))?;
        let total_vectors =
            u64::try_from(total).map_err(|_| format!("invalid vector count {total}"))?;
        let is_trained = match trained {
            0 => false,
            1 => true,
            other => return Err(format!("invalid trained flag {other}")),
        };
        let metric = match metric_code {
            0 => MetricKind::InnerProduct,
            1 => MetricKind::L2,
            code => MetricKind::Other {
                code,
                arg: metric_arg,
            },
        };

        Ok(Self {
            kind,
            dimension,
            total_vectors,
            is_trained,
            metric,
        })
    }
}

struct HeaderReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl HeaderReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| format!("truncated header: need {end} bytes, have {}", self.bytes.len()))?;
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32, String> {
        self.take().map(i32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, String> {
        self.take().map(i64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, String> {
        self.take().map(f32::from_le_bytes)
    }
}

/// Single-file store for the index artifact.
#[derive(Debug, Clone)]
pub struct IndexArtifactStore {
    path: PathBuf,
    expected_dimension: Option<u32>,
}

impl IndexArtifactStore {
    /// Store backed by `path`, optionally pinning the dimension every index must declare.
    pub fn new(path: impl Into<PathBuf>, expected_dimension: Option<u32>) -> Self {
        Self {
            path: path.into(),
            expected_dimension,
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an index has been stored.
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Replace the stored index with `bytes`.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), StorageError> {
        write_whole(&self.path, bytes).await?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Index written");
        Ok(())
    }

    /// Return the stored index.
    pub async fn read(&self) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(StorageError::io(&self.path))
    }

    /// Re-open the stored index, check its header, and write it back unchanged.
    pub async fn reopen(&self) -> Result<IndexHeader, StorageError> {
        let bytes = self.read().await?;
        let header = IndexHeader::parse(&bytes).map_err(|reason| self.malformed(reason))?;
        if let Some(expected) = self.expected_dimension
            && header.dimension != expected
        {
            return Err(self.malformed(format!(
                "index dimension {} does not match expected {expected}",
                header.dimension
            )));
        }
        self.write(&bytes).await?;
        tracing::info!(
            kind = %header.kind,
            dimension = header.dimension,
            total_vectors = header.total_vectors,
            "Index validated"
        );
        Ok(header)
    }

    fn malformed(&self, reason: String) -> StorageError {
        StorageError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }
}

#[cfg(test)]
pub(crate) fn flat_index_bytes(dimension: i32, vectors: &[f32]) -> Vec<u8> {
    let total = vectors.len() as i64 / i64::from(dimension);
    let mut out = b"IxF2".to_vec();
    out.extend_from_slice(&dimension.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&(1_i64 << 20).to_le_bytes());
    out.extend_from_slice(&(1_i64 << 20).to_le_bytes());
    out.push(1);
    out.extend_from_slice(&1_i32.to_le_bytes());
    out.extend_from_slice(&(vectors.len() as u64).to_le_bytes());
    for value in vectors {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::scratch_dir;

    #[test]
    fn parses_flat_l2_header() {
        let bytes = flat_index_bytes(4, &[0.5; 8]);
        let header = IndexHeader::parse(&bytes).expect("header");
        assert_eq!(header.kind, "IxF2");
        assert_eq!(header.dimension, 4);
        assert_eq!(header.total_vectors, 2);
        assert!(header.is_trained);
        assert_eq!(header.metric, MetricKind::L2);
        assert_eq!(header.to_string(), "IxF2 d=4 ntotal=2");
    }

    #[test]
    fn parses_binary_header_layout() {
        let mut bytes = b"IBxF".to_vec();
        bytes.extend_from_slice(&64_i32.to_le_bytes());
        bytes.extend_from_slice(&8_i32.to_le_bytes());
        bytes.extend_from_slice(&3_i64.to_le_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&1_i32.to_le_bytes());

        let header = IndexHeader::parse(&bytes).expect("binary header");
        assert_eq!(header.dimension, 64);
        assert_eq!(header.total_vectors, 3);
    }

    #[test]
    fn metric_argument_is_read_for_lp_metric() {
        let mut bytes = flat_index_bytes(2, &[]);
        bytes.truncate(33);
        bytes.extend_from_slice(&4_i32.to_le_bytes());
        bytes.extend_from_slice(&3.0_f32.to_le_bytes());
        let header = IndexHeader::parse(&bytes).expect("header");
        assert_eq!(
            header.metric,
            MetricKind::Other {
                code: 4,
                arg: Some(3.0)
            }
        );
    }

    #[test]
    fn rejects_garbage_and_truncated_blobs() {
        assert!(IndexHeader::parse(b"").is_err());
        assert!(IndexHeader::parse(b"%PDF-1.7 not an index").is_err());
        let bytes = flat_index_bytes(4, &[1.0; 4]);
        assert!(IndexHeader::parse(&bytes[..20]).is_err());

        let mut zero_dim = bytes.clone();
        zero_dim[4..8].copy_from_slice(&0_i32.to_le_bytes());
        assert!(IndexHeader::parse(&zero_dim).is_err());

        let mut bad_flag = bytes;
        bad_flag[32] = 7;
        assert!(IndexHeader::parse(&bad_flag).is_err());
    }

    #[tokio::test]
    async fn reopen_keeps_bytes_identical() {
        let store = IndexArtifactStore::new(scratch_dir().join("faiss_index.bin"), None);
        assert!(!store.exists().await);

        let bytes = flat_index_bytes(3, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        store.write(&bytes).await.expect("write");
        let header = store.reopen().await.expect("reopen");
        assert_eq!(header.total_vectors, 2);
        assert!(store.exists().await);
        assert_eq!(store.read().await.expect("read"), bytes);
    }

    #[tokio::test]
    async fn reopen_enforces_expected_dimension() {
        let store = IndexArtifactStore::new(scratch_dir().join("faiss_index.bin"), Some(768));
        store
            .write(&flat_index_bytes(3, &[0.0; 3]))
            .await
            .expect("write");
        assert!(matches!(
            store.reopen().await,
            Err(StorageError::Malformed { reason, .. }) if reason.contains("768")
        ));
    }

    #[tokio::test]
    async fn read_of_missing_index_is_not_found() {
        let store = IndexArtifactStore::new(scratch_dir().join("absent.bin"), None);
        assert!(matches!(store.read().await, Err(StorageError::NotFound(_))));
    }
}
