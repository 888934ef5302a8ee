//! Similarity-weighted budget estimation over search results

use crate::storage::SimilarityResult;

/// Similarity-weighted mean of the budgets in `results`.
///
/// Each result with a budget contributes `budget * similarity` to the
/// numerator and `similarity` to the denominator; results without a budget
/// are skipped rather than counted with zero weight. Returns `None` when
/// the total weight is exactly zero, including when nothing was eligible.
pub fn estimate_budget(results: &[SimilarityResult]) -> Option<f64> {
    let (weighted_sum, total_weight) = results
        .iter()
        .filter_map(|r| r.budget.map(|budget| (budget, f64::from(r.similarity))))
        .filter(|(_, weight)| weight.is_finite())
        .fold((0.0_f64, 0.0_f64), |(sum, total), (budget, weight)| {
            (sum + budget * weight, total + weight)
        });

    if total_weight == 0.0 {
        return None;
    }
    Some(weighted_sum / total_weight)
}
