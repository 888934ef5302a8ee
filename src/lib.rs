//! # Budget Index
//!
//! Similarity search over image embeddings paired with per-image metadata,
//! and similarity-weighted budget estimation from the nearest neighbours.
//!
//! This library provides:
//! - Exact inner-product search over unit-normalized embeddings
//! - An append-only metadata store kept in step with the index
//! - Crash-safe persistence of both as a matched pair
//! - Weighted budget estimation with a confidence threshold
//!
//! ## Example
//!
//! ```rust
//! use budget_index::{BudgetService, IngestInput, ServiceConfig, Vector};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = ServiceConfig {
//!     dimension: 3,
//!     ..ServiceConfig::with_storage_root(dir.path())
//! };
//! let service = BudgetService::open(config).unwrap();
//!
//! let input = IngestInput {
//!     metadata: Some(r#"{"budget": 120, "status": "open"}"#.to_string()),
//!     ..Default::default()
//! };
//! service.ingest(Vector::new(vec![1.0, 0.0, 0.0]), &input).unwrap();
//!
//! let estimate = service.estimate(Vector::new(vec![1.0, 0.1, 0.0]), Some(5)).unwrap();
//! assert_eq!(estimate.best_match_budget, Some(120.0));
//! ```

pub mod config;
pub mod error;
pub mod estimator;
pub mod flat_index;
pub mod metadata;
pub mod persistence;
pub mod server;
pub mod service;
pub mod similarity;
pub mod storage;
pub mod vector;

pub use config::ServiceConfig;
pub use error::{BudgetIndexError, Result};
pub use estimator::estimate_budget;
pub use flat_index::FlatIndex;
pub use metadata::{build_metadata, MetadataRecord, MetadataStore, ReferenceId};
pub use persistence::PersistenceManager;
pub use service::{BudgetEstimate, BudgetService, Embedder, IngestInput, Ingested};
pub use storage::{SimilarityResult, VectorStore};
pub use vector::{Vector, EMBEDDING_DIM};
