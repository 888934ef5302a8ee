//! Similarity scoring between unit-normalized embeddings

use crate::error::{BudgetIndexError, Result};
use crate::vector::Vector;

/// Inner product of two equal-length slices.
///
/// For unit vectors this is their cosine similarity, in `[-1, 1]` up to
/// rounding.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity of two unit vectors, checking dimensions first.
pub fn similarity(v1: &Vector, v2: &Vector) -> Result<f32> {
    if v1.dimension() != v2.dimension() {
        return Err(BudgetIndexError::DimensionMismatch {
            expected: v1.dimension(),
            actual: v2.dimension(),
        });
    }
    Ok(inner_product(v1.as_slice(), v2.as_slice()))
}
