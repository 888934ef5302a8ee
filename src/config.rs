//! Service configuration

use crate::error::{BudgetIndexError, Result};
use crate::vector::EMBEDDING_DIM;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default storage root, relative to the working directory.
pub const DEFAULT_STORAGE_ROOT: &str = "data";
/// Default best-match similarity needed for `threshold_passed`.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.9;
/// Default number of neighbours when the caller gives no `top_k`.
pub const DEFAULT_TOP_K: usize = 5;

/// Configuration for the budget service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the index and metadata artifacts.
    pub storage_root: PathBuf,
    /// Minimum best-match similarity for an estimate to count as confident.
    pub similarity_threshold: f32,
    pub default_top_k: usize,
    /// Embedding width.
    pub dimension: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_top_k: DEFAULT_TOP_K,
            dimension: EMBEDDING_DIM,
        }
    }
}

impl ServiceConfig {
    /// Default configuration rooted at `storage_root`.
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(BudgetIndexError::ConfigError(
                "dimension must be positive".to_string(),
            ));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(BudgetIndexError::ConfigError(format!(
                "similarity threshold must be finite, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}
