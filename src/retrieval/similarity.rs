//! Vector similarity.

use tracing::warn;

/// Cosine similarity of two vectors, clamped to `[-1, 1]`.
///
/// Mismatched dimensions or a zero-magnitude vector give `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        warn!(left = a.len(), right = b.len(), "Embedding dimension mismatch");
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        warn!(dimension = a.len(), "Zero-magnitude embedding");
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
