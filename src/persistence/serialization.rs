//! Serialization: bincode for the vector index, JSON for metadata.
//!
//! The index artifact is framed as `[crc32: u32 LE][payload: bincode(IndexArtifact)]`.
//! Its payload records the crc32 of the metadata artifact it was saved with,
//! which is how a loader tells whether the two files belong together.

use crate::error::{BudgetIndexError, Result};
use crate::flat_index::FlatIndex;
use crate::metadata::{MetadataRecord, MetadataStore};
use serde::{Deserialize, Serialize};

/// Version written into every index artifact.
pub const INDEX_FORMAT_VERSION: u32 = 1;

const FRAME_HEADER: usize = 4;

/// Decoded contents of the index artifact.
#[derive(Debug, PartialEq, Deserialize)]
pub struct IndexArtifact {
    pub version: u32,
    pub dimension: usize,
    pub count: usize,
    pub metadata_crc: u32,
    pub vectors: Vec<f32>,
}

// Same layout as `IndexArtifact`, borrowing the index buffer instead of
// copying it.
#[derive(Serialize)]
struct IndexArtifactRef<'a> {
    version: u32,
    dimension: usize,
    count: usize,
    metadata_crc: u32,
    vectors: &'a [f32],
}

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| BudgetIndexError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| BudgetIndexError::SerializationError(e.to_string()))
}

/// Encode data to pretty-printed JSON bytes.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| BudgetIndexError::SerializationError(e.to_string()))
}

/// Decode data from JSON bytes.
pub fn from_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| BudgetIndexError::SerializationError(e.to_string()))
}

/// Encode the metadata collection as a JSON list in ordinal order.
pub fn encode_metadata(metadata: &MetadataStore) -> Result<Vec<u8>> {
    to_json_pretty(metadata)
}

/// Decode a metadata artifact.
pub fn decode_metadata(bytes: &[u8]) -> Result<MetadataStore> {
    let records: Vec<MetadataRecord> = from_json(bytes)?;
    Ok(MetadataStore::from(records))
}

/// Encode the index, linking it to the metadata bytes saved alongside it.
pub fn encode_index(index: &FlatIndex, metadata_crc: u32) -> Result<Vec<u8>> {
    let payload = to_bincode(&IndexArtifactRef {
        version: INDEX_FORMAT_VERSION,
        dimension: index.dimension(),
        count: index.len(),
        metadata_crc,
        vectors: index.as_raw(),
    })?;

    let mut framed = Vec::with_capacity(FRAME_HEADER + payload.len());
    framed.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Decode an index artifact, verifying its checksum and version.
pub fn decode_index(bytes: &[u8]) -> Result<IndexArtifact> {
    if bytes.len() < FRAME_HEADER {
        return Err(BudgetIndexError::StorageError(
            "index artifact too small for header".to_string(),
        ));
    }
    let (header, payload) = bytes.split_at(FRAME_HEADER);
    let expected_crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if crc32fast::hash(payload) != expected_crc {
        return Err(BudgetIndexError::StorageError(
            "index artifact checksum mismatch".to_string(),
        ));
    }

    let artifact: IndexArtifact = from_bincode(payload)?;
    if artifact.version != INDEX_FORMAT_VERSION {
        return Err(BudgetIndexError::StorageError(format!(
            "unsupported index format version {}",
            artifact.version
        )));
    }
    Ok(artifact)
}
