use thiserror::Error;

use crate::shared::embedding::Embedding;
use crate::shared::face_record::{FaceRecord, FaceSummary, MatchCandidate, NewFace, StoreStats};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("face store unreachable: {0}")]
    Unavailable(String),
    #[error("face store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("face store I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("face store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("face store returned an invalid response: {0}")]
    InvalidResponse(String),
    #[error("vector dimension mismatch: store expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Domain interface over the vector store that holds registered faces.
///
/// Implementations are shared across concurrent callers, hence `Send + Sync`
/// and `&self` receivers; each one guards its own state.
pub trait FaceStore: Send + Sync {
    /// Persists a new face under a freshly generated identifier.
    ///
    /// Either the whole record becomes visible or nothing does.
    fn store(&self, face: NewFace) -> Result<String, StoreError>;

    /// Up to `limit` records scoring at least `score_threshold` against
    /// `query`, best first.
    fn search(
        &self,
        query: &Embedding,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<MatchCandidate>, StoreError>;

    fn fetch(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError>;

    /// Returns `false` when no record has this id.
    fn delete(&self, face_id: &str) -> Result<bool, StoreError>;

    /// Up to `limit` records in backend order. Not a ranking.
    fn list(&self, limit: usize) -> Result<Vec<FaceSummary>, StoreError>;

    /// Never fails: backend errors produce a degraded snapshot with
    /// [`StoreStats::error`] set.
    fn stats(&self) -> StoreStats;

    /// Removes every record. Irreversible.
    fn clear(&self) -> Result<bool, StoreError>;

    /// Vector dimension this store was configured with.
    fn dimension(&self) -> usize;
}

pub(crate) fn ensure_dimension(expected: usize, embedding: &Embedding) -> Result<(), StoreError> {
    if embedding.dimension() != expected {
        return Err(StoreError::DimensionMismatch {
            expected,
            actual: embedding.dimension(),
        });
    }
    Ok(())
}
