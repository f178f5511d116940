use crate::shared::embedding::{Embedding, EmbeddingError};

/// Cosine similarity of two unit embeddings, clamped to `[0, 1]`.
///
/// Negative values (anti-correlated vectors) collapse to 0.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f64, EmbeddingError> {
    raw_cosine(a, b).map(clamp_score)
}

/// Unclamped cosine in `[-1, 1]`. Score floors are compared against this
/// value, so a floor of 0 still excludes anti-correlated faces.
///
/// Both inputs are already normalized, so the dot product is the cosine.
pub fn raw_cosine(a: &Embedding, b: &Embedding) -> Result<f64, EmbeddingError> {
    if a.dimension() != b.dimension() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.dimension(),
            actual: b.dimension(),
        });
    }

    let dot: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    Ok(dot)
}

/// Maps a raw cosine value onto the reported `[0, 1]` score range.
///
/// Shared with backends whose index computes the cosine itself.
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, 1.0)
}
