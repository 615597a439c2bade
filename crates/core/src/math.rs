//! Vector math utilities
//!
//! Similarity helpers for both dense slices and the sparse name-to-weight
//! vectors the engine uses for profiles and item features. All functions
//! return a defined 0.0 instead of NaN when a norm is zero.

use std::collections::HashMap;

/// Dot product of two dense vectors
///
/// Returns 0.0 when the lengths differ.
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm of a dense vector
pub fn l2_norm(a: &[f64]) -> f64 {
    a.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Normalize a dense vector in place to unit length
///
/// A zero vector is left untouched.
pub fn normalize_vector(a: &mut [f64]) {
    let norm = l2_norm(a);
    if norm > 0.0 {
        for x in a.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity of two dense vectors
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product(a, b) / (norm_a * norm_b)
}

/// Cosine similarity of two sparse name-to-weight vectors
///
/// The dot product runs over the key intersection while each norm covers the
/// full vector, so disjoint vectors score 0.0 and identical ones score 1.0.
pub fn sparse_cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (key, value_a) in a {
        if let Some(value_b) = b.get(key) {
            dot += value_a * value_b;
        }
        norm_a += value_a * value_a;
    }

    let norm_b: f64 = b.values().map(|v| v * v).sum();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
