//! Vector and set similarity measures shared by both scorers.

use std::collections::BTreeSet;

use crate::error::{RecError, Result};

/// Compute cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero magnitude. The result is clamped
/// to `[-1.0, 1.0]`; vectors with only non-negative components always score in
/// `[0.0, 1.0]`.
///
/// # Errors
///
/// Returns [`RecError::Internal`] if the lengths differ. Feature vectors share
/// one dimension, so a mismatch means the store or profile is corrupt.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RecError::Internal(format!(
            "feature dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return Ok(0.0);
    }
    let result = dot / denom;
    if !result.is_finite() {
        return Ok(0.0);
    }
    Ok(result.clamp(-1.0, 1.0))
}

/// L2 norm of a vector.
pub fn magnitude(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Share of genres two sets have in common, relative to the larger set.
///
/// `|a ∩ b| / max(|a|, |b|)`, or 0.0 if either set is empty.
pub fn genre_overlap(item_genres: &BTreeSet<String>, favorite_genres: &BTreeSet<String>) -> f64 {
    if item_genres.is_empty() || favorite_genres.is_empty() {
        return 0.0;
    }
    let shared = item_genres.intersection(favorite_genres).count();
    shared as f64 / item_genres.len().max(favorite_genres.len()) as f64
}
