//! Per-entry metadata records and the append-only store that holds them.

pub mod builder;
pub mod store;

pub use builder::{build_metadata, coerce_budget_value, parse_budget, parse_metadata_text};
pub use store::MetadataStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata attached to one indexed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetadataRecord {
    /// Metadata text exactly as it was submitted.
    pub raw_metadata: Option<String>,
    /// The parsed JSON object, or the raw text when it did not parse as one.
    pub parsed_metadata: Option<Value>,
    pub budget: Option<f64>,
    pub status: Option<String>,
    /// Caller-supplied identifier. When absent, readers see the ordinal.
    pub reference_id: Option<String>,
}

impl MetadataRecord {
    /// The reference id as seen by readers: the stored one, or the ordinal.
    pub fn resolved_reference_id(&self, ordinal: usize) -> ReferenceId {
        match &self.reference_id {
            Some(id) => ReferenceId::Given(id.clone()),
            None => ReferenceId::Ordinal(ordinal),
        }
    }
}

/// Identifier reported for a search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceId {
    Given(String),
    Ordinal(usize),
}

impl std::fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceId::Given(id) => f.write_str(id),
            ReferenceId::Ordinal(ordinal) => write!(f, "{}", ordinal),
        }
    }
}
