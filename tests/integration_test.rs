//! Integration tests for the budget index

use approx::assert_relative_eq;
use budget_index::persistence::PersistenceManager;
use budget_index::similarity::similarity;
use budget_index::{
    build_metadata, BudgetIndexError, BudgetService, IngestInput, ReferenceId, ServiceConfig,
    Vector, VectorStore, EMBEDDING_DIM,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn raw_embedding(seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn embedding(seed: u64) -> Vector {
    Vector::new(raw_embedding(seed))
}

fn perturbed(base: &[f32], seed: u64, scale: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    base.iter()
        .map(|x| x + rng.gen_range(-scale..scale))
        .collect()
}

fn open(dir: &TempDir) -> BudgetService {
    BudgetService::open(ServiceConfig::with_storage_root(dir.path())).unwrap()
}

fn with_metadata(text: &str) -> IngestInput {
    IngestInput {
        metadata: Some(text.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_ingest_and_search_similar_images() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    let meta = r#"{"budget": 100, "status": "open"}"#;

    let a = raw_embedding(1);
    let b = perturbed(&a, 2, 0.2);

    let first = service.ingest(Vector::new(a.clone()), &with_metadata(meta)).unwrap();
    assert_eq!(first.record.budget, Some(100.0));
    assert_eq!(first.record.status.as_deref(), Some("open"));

    let second = service.ingest(Vector::new(b.clone()), &with_metadata(meta)).unwrap();
    assert_eq!(second.ordinal, 1);
    assert_eq!(second.record.budget, Some(100.0));
    assert_eq!(second.record.status.as_deref(), Some("open"));

    let results = service.search(Vector::new(a.clone()), Some(2)).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].ordinal, 0);
    assert_relative_eq!(results[0].similarity, 1.0, epsilon = 1e-4);
    assert_eq!(results[1].ordinal, 1);
    assert!(results[1].similarity < 1.0);

    let expected = similarity(
        &Vector::new(a).normalized().unwrap(),
        &Vector::new(b).normalized().unwrap(),
    )
    .unwrap();
    assert_relative_eq!(results[1].similarity, expected, epsilon = 1e-4);
}

#[test]
fn test_weighted_estimate_scenario() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig {
        dimension: 3,
        ..ServiceConfig::with_storage_root(dir.path())
    };
    let service = BudgetService::open(config).unwrap();

    service.ingest(Vector::new(vec![1.0, 0.0, 0.0]), &with_metadata(r#"{"budget": 100}"#)).unwrap();
    service.ingest(Vector::new(vec![0.0, 1.0, 0.0]), &with_metadata(r#"{"budget": 200}"#)).unwrap();

    // Unit query with similarity 0.9 to the first entry and 0.1 to the second.
    let query = Vector::new(vec![0.9, 0.1, (1.0f32 - 0.82).sqrt()]);
    let estimate = service.estimate(query, Some(2)).unwrap();

    assert_relative_eq!(estimate.details[0].similarity, 0.9, epsilon = 1e-5);
    assert_relative_eq!(estimate.details[1].similarity, 0.1, epsilon = 1e-5);
    assert_relative_eq!(estimate.suggested_value.unwrap(), 110.0, epsilon = 1e-3);
    assert!(estimate.threshold_passed);
    assert_eq!(estimate.best_match_budget, Some(100.0));
    assert_eq!(estimate.best_match_reference_id, Some(ReferenceId::Ordinal(0)));
}

#[test]
fn test_estimate_without_budgets_is_null() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    service.ingest(embedding(5), &with_metadata("not json")).unwrap();

    let estimate = service.estimate(embedding(5), None).unwrap();
    assert_eq!(estimate.suggested_value, None);
    assert_eq!(estimate.details.len(), 1);
    assert!(estimate.threshold_passed);
}

#[test]
fn test_unparseable_metadata() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    let ingested = service.ingest(embedding(3), &with_metadata("not json")).unwrap();

    assert_eq!(ingested.record.parsed_metadata, Some(json!("not json")));
    assert_eq!(ingested.record.raw_metadata.as_deref(), Some("not json"));
    assert_eq!(ingested.record.budget, None);
}

#[test]
fn test_wrong_dimension_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    service.ingest(embedding(1), &IngestInput::default()).unwrap();
    let saved = std::fs::read(dir.path().join("index.bin")).unwrap();

    let result = service.ingest(Vector::new(vec![1.0; 512]), &with_metadata(r#"{"budget": 1}"#));
    assert!(matches!(
        result,
        Err(BudgetIndexError::DimensionMismatch { expected: 2048, actual: 512 })
    ));
    assert!(result.unwrap_err().is_validation());

    assert_eq!(service.stats().unwrap().entries, 1);
    assert_eq!(std::fs::read(dir.path().join("index.bin")).unwrap(), saved);
    assert!(service.search(Vector::new(vec![1.0; 512]), None).is_err());
}

#[test]
fn test_ordinals_are_dense_across_restarts() {
    let dir = TempDir::new().unwrap();
    {
        let service = open(&dir);
        for i in 0..6 {
            let ingested = service.ingest(embedding(i), &IngestInput::default()).unwrap();
            assert_eq!(ingested.ordinal, i as usize);
        }
    }

    let service = open(&dir);
    assert_eq!(service.stats().unwrap().entries, 6);
    let next = service.ingest(embedding(99), &IngestInput::default()).unwrap();
    assert_eq!(next.ordinal, 6);

    let results = service.search(embedding(3), Some(100)).unwrap();
    assert_eq!(results.len(), 7);
    assert_eq!(results[0].ordinal, 3);
    for pair in results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    let ordinals: HashSet<usize> = results.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, (0..7).collect());
}

#[test]
fn test_empty_index_search() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    for k in [0, 1, 5, 1000] {
        assert!(service.search(embedding(1), Some(k)).unwrap().is_empty());
    }
}

#[test]
fn test_save_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let manager = PersistenceManager::new(dir.path());

    let mut store = VectorStore::new(EMBEDDING_DIM);
    let inputs = [
        (Some(r#"{"budget": 0.1, "status": "open", "tags": ["a", "b"]}"#), None, None, None),
        (Some("plain text"), Some("1234.5678"), Some("ref-9"), Some("done")),
        (None, None, None, None),
    ];
    for (seed, (meta, budget, reference, status)) in inputs.iter().enumerate() {
        let v = embedding(seed as u64).normalized().unwrap();
        store
            .append(&v, build_metadata(*meta, *budget, *reference, *status))
            .unwrap();
    }

    manager.save(&store).unwrap();
    let loaded = manager.load(EMBEDDING_DIM).unwrap();
    assert_eq!(loaded, store);

    // A second save of the loaded state produces identical artifacts.
    let index_bytes = std::fs::read(manager.index_path()).unwrap();
    let metadata_bytes = std::fs::read(manager.metadata_path()).unwrap();
    manager.save(&loaded).unwrap();
    assert_eq!(std::fs::read(manager.index_path()).unwrap(), index_bytes);
    assert_eq!(std::fs::read(manager.metadata_path()).unwrap(), metadata_bytes);
}

#[test]
fn test_concurrent_ingest_and_search() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(open(&dir));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        service
                            .ingest(embedding(t * 100 + i), &IngestInput::default())
                            .unwrap()
                            .ordinal
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                for _ in 0..10 {
                    let results = service.search(embedding(7), Some(3)).unwrap();
                    assert!(results.len() <= 3);
                }
            })
        })
        .collect();

    let mut ordinals: Vec<usize> = writers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    for r in readers {
        r.join().unwrap();
    }

    ordinals.sort_unstable();
    assert_eq!(ordinals, (0..20).collect::<Vec<_>>());
    assert_eq!(open(&dir).stats().unwrap().entries, 20);
}
