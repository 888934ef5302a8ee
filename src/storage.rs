//! In-memory pairing of the vector index with its metadata

use crate::error::{BudgetIndexError, Result};
use crate::flat_index::FlatIndex;
use crate::metadata::{MetadataRecord, MetadataStore, ReferenceId};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One search hit, joined with the metadata of the matched entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub ordinal: usize,
    /// Cosine similarity to the query.
    pub similarity: f32,
    pub metadata: Option<Value>,
    pub raw_metadata: Option<String>,
    pub budget: Option<f64>,
    pub status: Option<String>,
    pub reference_id: ReferenceId,
}

impl SimilarityResult {
    fn from_record(ordinal: usize, similarity: f32, record: &MetadataRecord) -> Self {
        Self {
            ordinal,
            similarity,
            metadata: record.parsed_metadata.clone(),
            raw_metadata: record.raw_metadata.clone(),
            budget: record.budget,
            status: record.status.clone(),
            reference_id: record.resolved_reference_id(ordinal),
        }
    }
}

/// The vector index and metadata store, kept the same length.
///
/// Every successful [`VectorStore::append`] grows both by exactly one entry;
/// a failed one changes neither.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl VectorStore {
    /// Create an empty store for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            index: FlatIndex::new(dimension),
            metadata: MetadataStore::new(),
        }
    }

    /// Pair an index with its metadata, checking they have the same length.
    pub fn from_parts(index: FlatIndex, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(BudgetIndexError::Inconsistent {
                index_len: index.len(),
                metadata_len: metadata.len(),
            });
        }
        Ok(Self { index, metadata })
    }

    /// Append a unit vector together with its metadata record.
    pub fn append(&mut self, vector: &Vector, record: MetadataRecord) -> Result<usize> {
        if self.index.len() != self.metadata.len() {
            return Err(BudgetIndexError::Inconsistent {
                index_len: self.index.len(),
                metadata_len: self.metadata.len(),
            });
        }

        let ordinal = self.index.add(vector)?;
        self.metadata.append(record);
        Ok(ordinal)
    }

    /// Roll both collections back to their first `len` entries.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.index.truncate(len);
        self.metadata.truncate(len);
    }

    /// Get the number of entries in the store
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Dimension of the stored vectors
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Search for the `k` most similar entries to a unit query vector.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<SimilarityResult>> {
        let index_results = self.index.search(query, k)?;

        let results = index_results
            .into_iter()
            .filter_map(|(ordinal, similarity)| {
                self.metadata
                    .get(ordinal)
                    .map(|record| SimilarityResult::from_record(ordinal, similarity, record))
            })
            .collect();

        Ok(results)
    }

    /// Get a reference to the underlying index.
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Get a reference to the metadata store.
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }
}
