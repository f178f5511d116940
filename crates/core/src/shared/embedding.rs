use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding is empty")]
    Empty,
    #[error("embedding has a non-finite component at index {index}")]
    NonFinite { index: usize },
    #[error("embedding has zero norm and cannot be normalized")]
    DegenerateVector,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// A unit-norm face embedding.
///
/// The only way to build one is [`Embedding::normalize`], so every value of
/// this type satisfies `‖v‖₂ == 1` up to floating-point rounding.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Scales `raw` by `1 / ‖raw‖₂`.
    ///
    /// Accumulates in f64 so 512-d model outputs keep their precision.
    pub fn normalize(raw: &[f32]) -> Result<Self, EmbeddingError> {
        if raw.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if let Some(index) = raw.iter().position(|x| !x.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }

        let norm = raw
            .iter()
            .map(|x| (*x as f64) * (*x as f64))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(EmbeddingError::DegenerateVector);
        }

        let values = raw.iter().map(|x| ((*x as f64) / norm) as f32).collect();
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    pub fn ensure_dimension(&self, expected: usize) -> Result<(), EmbeddingError> {
        if self.dimension() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }
}
