//! Embedding vector type and normalization

use crate::error::{BudgetIndexError, Result};
use serde::{Deserialize, Serialize};

/// Width of the embeddings produced by the image feature extractor.
pub const EMBEDDING_DIM: usize = 2048;

/// Allowed deviation from 1.0 when checking that a vector is unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// An embedding vector in n-dimensional space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Compute the L2 norm (magnitude) of the vector
    ///
    /// Components are scaled by the largest magnitude before squaring, so
    /// very small or very large vectors neither underflow nor overflow.
    pub fn norm(&self) -> f32 {
        let scale = self.max_abs();
        if scale == 0.0 || !scale.is_finite() {
            return scale;
        }
        scale * scaled_norm(&self.data, scale)
    }

    fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |m, x| m.max(x.abs()))
    }

    /// Whether the vector has unit length within [`UNIT_NORM_TOLERANCE`].
    pub fn is_unit(&self) -> bool {
        (self.norm() - 1.0).abs() <= UNIT_NORM_TOLERANCE
    }

    /// Fail unless the vector has exactly `expected` components.
    pub fn check_dimension(&self, expected: usize) -> Result<()> {
        if self.dimension() != expected {
            return Err(BudgetIndexError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }

    /// Normalize the vector to unit length
    pub fn normalize(&mut self) -> Result<()> {
        if self.data.iter().any(|x| !x.is_finite()) {
            return Err(BudgetIndexError::InvalidVector {
                reason: "Vector contains non-finite components".to_string(),
            });
        }
        let scale = self.max_abs();
        if scale == 0.0 {
            return Err(BudgetIndexError::InvalidVector {
                reason: "Cannot normalize zero vector".to_string(),
            });
        }
        let norm = scaled_norm(&self.data, scale);
        for x in &mut self.data {
            *x = *x / scale / norm;
        }
        Ok(())
    }

    /// Create a normalized copy of the vector
    pub fn normalized(&self) -> Result<Vector> {
        let mut v = self.clone();
        v.normalize()?;
        Ok(v)
    }

    /// Parse a vector from a comma-separated string
    pub fn from_str(s: &str) -> Result<Self> {
        let data: Result<Vec<f32>> = s
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| BudgetIndexError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect();
        Ok(Vector::new(data?))
    }
}

/// L2 norm of `data / scale`, with `scale` the largest component magnitude.
fn scaled_norm(data: &[f32], scale: f32) -> f32 {
    data.iter()
        .map(|x| {
            let y = x / scale;
            y * y
        })
        .sum::<f32>()
        .sqrt()
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_vector_creation() {
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_vector_norm() {
        let v = Vector::new(vec![3.0, 4.0]);
        assert_relative_eq!(v.norm(), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_vector_normalize() {
        let mut v = Vector::new(vec![3.0, 4.0]);
        v.normalize().unwrap();
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.as_slice()[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(v.as_slice()[1], 0.8, epsilon = 1e-6);
        assert!(v.is_unit());
    }

    #[test]
    fn test_zero_vector_rejected() {
        let v = Vector::new(vec![0.0; 4]);
        assert!(matches!(
            v.normalized(),
            Err(BudgetIndexError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_extreme_magnitudes_normalize() {
        for magnitude in [1e-25f32, 1e-40, 1e20, 3e38] {
            let v = Vector::new(vec![magnitude; 4]);
            assert!(v.norm() > 0.0);
            let unit = v.normalized().unwrap();
            assert!(unit.is_unit());
            assert_relative_eq!(unit.as_slice()[0], 0.5, epsilon = 1e-6);
        }
        assert_relative_eq!(Vector::new(vec![1e20; 4]).norm(), 2e20, max_relative = 1e-6);
    }

    #[test]
    fn test_nan_rejected() {
        let v = Vector::new(vec![1.0, f32::NAN]);
        assert!(v.normalized().is_err());
    }

    #[test]
    fn test_check_dimension() {
        let v = Vector::new(vec![1.0, 2.0]);
        assert!(v.check_dimension(2).is_ok());
        assert!(matches!(
            v.check_dimension(EMBEDDING_DIM),
            Err(BudgetIndexError::DimensionMismatch { expected: 2048, actual: 2 })
        ));
    }

    #[test]
    fn test_from_str() {
        let v = Vector::from_str("1.0, 2.0, 3.0").unwrap();
        assert_eq!(v.dimension(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
        assert!(Vector::from_str("1.0,abc").is_err());
    }

    proptest! {
        #[test]
        fn normalized_vectors_have_unit_norm(
            data in prop::collection::vec(-1000.0f32..1000.0, 1..64)
        ) {
            prop_assume!(data.iter().any(|x| x.abs() > 1e-3));
            let v = Vector::new(data).normalized().unwrap();
            prop_assert!(v.is_unit());
        }
    }
}
