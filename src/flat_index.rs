//! Brute-force flat index: exact O(n) inner-product search

use rayon::prelude::*;

use crate::error::{BudgetIndexError, Result};
use crate::similarity::inner_product;
use crate::vector::Vector;

/// A flat (brute-force) index over unit vectors.
///
/// Vectors are stored contiguously in insertion order, so an entry's ordinal
/// is its position in the buffer. There is no removal: ordinals stay dense
/// and permanent.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    count: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create a new empty flat index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            count: 0,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from its contiguous component buffer.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(BudgetIndexError::StorageError(format!(
                "buffer of {} floats does not hold whole {}-dim vectors",
                data.len(),
                dimension
            )));
        }
        Ok(Self {
            dimension,
            count: data.len() / dimension,
            data,
        })
    }

    /// Dimension every stored vector has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The contiguous component buffer, in ordinal order.
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }

    /// Append a unit vector and return its ordinal.
    pub fn add(&mut self, vector: &Vector) -> Result<usize> {
        vector.check_dimension(self.dimension)?;
        if !vector.is_unit() {
            return Err(BudgetIndexError::InvalidVector {
                reason: format!("expected unit norm, got {}", vector.norm()),
            });
        }

        let ordinal = self.count;
        self.data.extend_from_slice(vector.as_slice());
        self.count += 1;
        Ok(ordinal)
    }

    /// Drop every vector from ordinal `len` on.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len < self.count {
            self.data.truncate(len * self.dimension);
            self.count = len;
        }
    }

    /// Return up to `k` `(ordinal, score)` pairs sorted by descending score.
    ///
    /// `k` is clamped to `[1, len]`. Equal scores are ordered by ascending
    /// ordinal. An empty index yields an empty list.
    pub fn search(&self, query: &Vector, k: usize) -> Result<Vec<(usize, f32)>> {
        query.check_dimension(self.dimension)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let k = k.clamp(1, self.count);

        let mut results: Vec<(usize, f32)> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, stored)| (ordinal, inner_product(query.as_slice(), stored)))
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(k);
        Ok(results)
    }
}
