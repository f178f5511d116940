use thiserror::Error;

use crate::extraction::domain::embedding_extractor::ExtractionError;
use crate::shared::embedding::EmbeddingError;
use crate::storage::domain::face_store::StoreError;

/// Caller input that can never succeed as given.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("threshold must be a finite value between 0.0 and 1.0, got {0}")]
    Threshold(f64),
    #[error("person name must not be empty")]
    EmptyPersonName,
    #[error("person name must be at most {max} characters, got {len}")]
    PersonNameTooLong { len: usize, max: usize },
    #[error("description must be at most {max} characters, got {len}")]
    DescriptionTooLong { len: usize, max: usize },
    #[error("detection confidence must be a finite value between 0.0 and 1.0, got {0}")]
    Confidence(f64),
    #[error("detection confidence {confidence:.3} is below the required {minimum:.3}")]
    LowConfidence { confidence: f64, minimum: f64 },
    #[error("limit must be between 1 and {max}, got {limit}")]
    Limit { limit: usize, max: usize },
}

/// Coarse classification a boundary layer can map to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input; retrying the same request cannot succeed.
    Validation,
    /// A collaborator (face store, embedding model) failed.
    CollaboratorUnavailable,
    /// Internally inconsistent vectors, e.g. a store of another dimension.
    InvariantViolation,
}

#[derive(Error, Debug)]
pub enum FaceMatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("face store failed: {0}")]
    Store(#[from] StoreError),
    #[error("embedding extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

impl FaceMatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FaceMatchError::Validation(_) => ErrorKind::Validation,
            FaceMatchError::Embedding(EmbeddingError::DimensionMismatch { .. }) => {
                ErrorKind::InvariantViolation
            }
            FaceMatchError::Embedding(_) => ErrorKind::Validation,
            FaceMatchError::Store(StoreError::DimensionMismatch { .. }) => {
                ErrorKind::InvariantViolation
            }
            FaceMatchError::Store(_) => ErrorKind::CollaboratorUnavailable,
            FaceMatchError::Extraction(ExtractionError::Inference(_)) => {
                ErrorKind::CollaboratorUnavailable
            }
            FaceMatchError::Extraction(_) => ErrorKind::Validation,
        }
    }

    pub fn is_client_fault(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}
