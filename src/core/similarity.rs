use crate::core::histogram::ImageSignature;
use serde::Serialize;
use std::path::PathBuf;

/// A candidate file that passed scoring against the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub path: PathBuf,
    /// `1 / (1 + chi_squared)`, always in `(0, 1]`.
    pub score: f64,
}

/// Chi-squared distance `sum((r - c)^2 / r)` over all bins, where `r` comes
/// from the reference. Reference bins that are zero contribute nothing, so
/// the measure is not symmetric: swapping the arguments generally changes
/// the result.
pub fn chi_squared(reference: &ImageSignature, candidate: &ImageSignature) -> f64 {
    reference
        .bins()
        .iter()
        .zip(candidate.bins())
        .filter(|(r, _)| (**r as f64).abs() > f64::EPSILON)
        .map(|(&r, &c)| {
            let (r, c) = (r as f64, c as f64);
            (r - c) * (r - c) / r
        })
        .sum()
}

/// Map a non-negative distance onto `(0, 1]`; zero distance is exactly 1.0.
pub fn similarity_from_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Similarity of `candidate` to `reference`.
pub fn similarity(reference: &ImageSignature, candidate: &ImageSignature) -> f64 {
    similarity_from_distance(chi_squared(reference, candidate))
}
