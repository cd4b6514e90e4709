use std::cmp::Ordering;

use crate::models::{DecisionRecord, Evidence};

/// Similarity assigned to pairs that cannot be compared.
pub const NOT_COMPARABLE: f32 = -1.0;

/// Cosine similarity in `[-1, 1]`.
///
/// Vectors of different length, empty vectors and zero-norm vectors score
/// [`NOT_COMPARABLE`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return NOT_COMPARABLE;
    }

    // f32 squares of large components overflow; accumulate wide.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return NOT_COMPARABLE;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Rank every record with an embedding by similarity to `query`, best first,
/// and keep the top `limit`.
pub fn vector_search(records: &[DecisionRecord], query: &[f32], limit: usize) -> Vec<Evidence> {
    let mut scored: Vec<(f32, &DecisionRecord)> = records
        .iter()
        .filter_map(|r| {
            r.embedding
                .as_deref()
                .map(|emb| (cosine_similarity(query, emb), r))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.sequence.cmp(&b.1.sequence))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, r)| Evidence {
            hash: r.hash.clone(),
            message: r.message.clone(),
            score,
        })
        .collect()
}
