//! Append-only, ordinal-indexed metadata collection

use serde::{Deserialize, Serialize};

use super::MetadataRecord;

/// Metadata records in ordinal order, parallel to the vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    records: Vec<MetadataRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return its ordinal.
    pub fn append(&mut self, record: MetadataRecord) -> usize {
        let ordinal = self.records.len();
        self.records.push(record);
        ordinal
    }

    pub fn get(&self, ordinal: usize) -> Option<&MetadataRecord> {
        self.records.get(ordinal)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop everything past the first `len` records.
    ///
    /// Only used when recovering from an interrupted save.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }
}

impl From<Vec<MetadataRecord>> for MetadataStore {
    fn from(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }
}
