//! The budget service: validates queries and coordinates the store,
//! persistence and estimation.
//!
//! A [`BudgetService`] is built once at startup from the persisted state and
//! shared by handle. Ingestion is single-writer: the writer guard is held
//! across append and save, and an append whose save fails is truncated away
//! again. Readers take the store lock only briefly, so they never observe a
//! half-applied append, but may see an entry for the duration of a save
//! that then fails.

use crate::config::ServiceConfig;
use crate::error::{BudgetIndexError, Result};
use crate::estimator::estimate_budget;
use crate::metadata::{build_metadata, MetadataRecord, ReferenceId};
use crate::persistence::PersistenceManager;
use crate::storage::{SimilarityResult, VectorStore};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Produces embeddings from encoded images.
///
/// Decoding and feature extraction live outside this crate; implementations
/// wrap whatever model serves them.
pub trait Embedder {
    /// Embed one encoded image.
    fn embed(&self, image: &[u8]) -> Result<Vector>;
}

/// Caller-supplied metadata for one ingestion. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestInput {
    pub metadata: Option<String>,
    pub budget: Option<String>,
    pub reference_id: Option<String>,
    pub status: Option<String>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingested {
    pub ordinal: usize,
    pub record: MetadataRecord,
}

/// A budget estimate with the neighbours it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetEstimate {
    /// Similarity-weighted mean budget of the neighbours.
    pub suggested_value: Option<f64>,
    pub best_match_score: Option<f32>,
    pub best_match_budget: Option<f64>,
    pub best_match_status: Option<String>,
    pub best_match_reference_id: Option<ReferenceId>,
    /// Whether the best match reaches the configured threshold.
    pub threshold_passed: bool,
    pub threshold: f32,
    pub details: Vec<SimilarityResult>,
}

impl BudgetEstimate {
    fn from_results(results: Vec<SimilarityResult>, threshold: f32) -> Self {
        let suggested_value = estimate_budget(&results);
        let best = results.first();
        Self {
            suggested_value,
            best_match_score: best.map(|b| b.similarity),
            best_match_budget: best.and_then(|b| b.budget),
            best_match_status: best.and_then(|b| b.status.clone()),
            best_match_reference_id: best.map(|b| b.reference_id.clone()),
            threshold_passed: best.is_some_and(|b| b.similarity >= threshold),
            threshold,
            details: results,
        }
    }
}

/// Summary of the service's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub dimension: usize,
    pub storage_root: PathBuf,
}

/// Parse a caller-supplied `top_k`.
///
/// Accepts a JSON integer, a whole-valued JSON float, or a string holding an
/// integer. Negative values become 0 and values past `usize::MAX` saturate;
/// the search then clamps either into `[1, len]`.
pub fn parse_top_k(value: &Value) -> Result<usize> {
    let invalid = || BudgetIndexError::InvalidTopK {
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => {
            if let Some(k) = n.as_i64() {
                Ok(saturating_usize(k))
            } else if let Some(k) = n.as_u64() {
                Ok(usize::try_from(k).unwrap_or(usize::MAX))
            } else {
                match n.as_f64() {
                    // Float-to-int `as` saturates at both ends.
                    Some(k) if k.is_finite() && k.fract() == 0.0 => Ok(k as usize),
                    _ => Err(invalid()),
                }
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(k) = s.parse::<i64>() {
                Ok(saturating_usize(k))
            } else {
                let k = s.parse::<u64>().map_err(|_| invalid())?;
                Ok(usize::try_from(k).unwrap_or(usize::MAX))
            }
        }
        _ => Err(invalid()),
    }
}

fn saturating_usize(k: i64) -> usize {
    if k < 0 {
        0
    } else {
        usize::try_from(k).unwrap_or(usize::MAX)
    }
}

/// Owns the paired index/metadata store and everything that touches it.
#[derive(Debug)]
pub struct BudgetService {
    config: ServiceConfig,
    persistence: PersistenceManager,
    store: RwLock<VectorStore>,
    writer: Mutex<()>,
}

impl BudgetService {
    /// Load persisted state from the configured storage root.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let persistence = PersistenceManager::new(&config.storage_root);
        let store = persistence.load(config.dimension)?;
        Self::with_store(config, persistence, store)
    }

    /// Build a service around an already loaded store.
    pub fn with_store(
        config: ServiceConfig,
        persistence: PersistenceManager,
        store: VectorStore,
    ) -> Result<Self> {
        config.validate()?;
        if store.dimension() != config.dimension {
            return Err(BudgetIndexError::ConfigError(format!(
                "store dimension {} does not match configured dimension {}",
                store.dimension(),
                config.dimension
            )));
        }
        info!(
            entries = store.len(),
            threshold = config.similarity_threshold,
            "budget service ready"
        );
        Ok(Self {
            config,
            persistence,
            store: RwLock::new(store),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Check the dimension of a raw embedding and normalize it.
    pub fn prepare(&self, vector: Vector) -> Result<Vector> {
        vector.check_dimension(self.config.dimension)?;
        vector.normalized()
    }

    /// Index an embedding with its metadata and persist the result.
    pub fn ingest(&self, vector: Vector, input: &IngestInput) -> Result<Ingested> {
        let vector = self.prepare(vector)?;
        let record = build_metadata(
            input.metadata.as_deref(),
            input.budget.as_deref(),
            input.reference_id.as_deref(),
            input.status.as_deref(),
        );

        let _writer = self.writer.lock().map_err(|_| BudgetIndexError::LockPoisoned)?;
        let ordinal = self.write_store()?.append(&vector, record.clone())?;
        let saved = self.persistence.save(&*self.read_store()?);
        if let Err(e) = saved {
            self.write_store()?.truncate(ordinal);
            warn!(ordinal, error = %e, "save failed, rolled back append");
            return Err(e);
        }

        info!(
            ordinal,
            budget = ?record.budget,
            status = ?record.status,
            "indexed embedding"
        );
        Ok(Ingested { ordinal, record })
    }

    /// Embed an image and index it.
    pub fn ingest_image(
        &self,
        embedder: &dyn Embedder,
        image: &[u8],
        input: &IngestInput,
    ) -> Result<Ingested> {
        let vector = embedder.embed(image)?;
        self.ingest(vector, input)
    }

    /// Find the stored entries most similar to an embedding.
    ///
    /// `top_k` defaults to the configured value and is clamped to
    /// `[1, len]`; an empty store returns no results.
    pub fn search(&self, vector: Vector, top_k: Option<usize>) -> Result<Vec<SimilarityResult>> {
        let query = self.prepare(vector)?;
        let k = top_k.unwrap_or(self.config.default_top_k);
        let results = self.read_store()?.search(&query, k)?;
        debug!(k, hits = results.len(), "search");
        Ok(results)
    }

    /// Embed an image and search for its neighbours.
    pub fn search_image(
        &self,
        embedder: &dyn Embedder,
        image: &[u8],
        top_k: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        let vector = embedder.embed(image)?;
        self.search(vector, top_k)
    }

    /// Estimate a budget for an embedding from its nearest neighbours.
    pub fn estimate(&self, vector: Vector, top_k: Option<usize>) -> Result<BudgetEstimate> {
        let results = self.search(vector, top_k)?;
        let estimate = BudgetEstimate::from_results(results, self.config.similarity_threshold);
        debug!(
            suggested = ?estimate.suggested_value,
            best = ?estimate.best_match_score,
            threshold_passed = estimate.threshold_passed,
            "estimate"
        );
        Ok(estimate)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let store = self.read_store()?;
        Ok(StoreStats {
            entries: store.len(),
            dimension: store.dimension(),
            storage_root: self.persistence.root().to_path_buf(),
        })
    }

    fn read_store(&self) -> Result<RwLockReadGuard<'_, VectorStore>> {
        self.store.read().map_err(|_| BudgetIndexError::LockPoisoned)
    }

    fn write_store(&self) -> Result<RwLockWriteGuard<'_, VectorStore>> {
        self.store.write().map_err(|_| BudgetIndexError::LockPoisoned)
    }
}
