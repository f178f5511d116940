use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::shared::embedding::Embedding;

/// A registered face as held by the face store.
///
/// Records are never edited in place; replacing one is a delete followed by
/// a fresh registration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub person_name: String,
    pub description: Option<String>,
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
}

impl FaceRecord {
    pub fn embedding_size(&self) -> usize {
        self.embedding.dimension()
    }

    pub fn summary(&self) -> FaceSummary {
        FaceSummary {
            face_id: self.face_id.clone(),
            person_name: self.person_name.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            embedding_size: self.embedding_size(),
        }
    }
}

/// Record metadata without the vector, as returned by listings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceSummary {
    pub face_id: String,
    pub person_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub embedding_size: usize,
}

/// Input to [`FaceStore::store`](crate::storage::domain::face_store::FaceStore::store).
/// The store assigns the identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct NewFace {
    pub embedding: Embedding,
    pub person_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewFace {
    pub fn into_record(self, face_id: String) -> FaceRecord {
        FaceRecord {
            face_id,
            person_name: self.person_name,
            description: self.description,
            embedding: self.embedding,
            created_at: self.created_at,
        }
    }
}

/// One ranked hit from a nearest-neighbour search. `similarity_score` is in `[0, 1]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub face_id: String,
    pub person_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub similarity_score: f64,
}

/// Outcome of a verification.
///
/// `matched_face_id` and `matched_person_name` are `Some` iff `is_match`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerificationResult {
    pub is_match: bool,
    pub matched_face_id: Option<String>,
    pub matched_person_name: Option<String>,
    pub similarity_score: f64,
    pub confidence: f64,
    pub threshold_used: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegisteredFace {
    pub face_id: String,
    pub person_name: String,
    pub description: Option<String>,
    pub embedding_size: usize,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of the backing collection.
///
/// `error` is set when the snapshot is degraded because the backend could
/// not be queried.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreStats {
    pub collection_name: String,
    pub record_count: usize,
    pub vector_dimension: usize,
    pub distance_metric: String,
    pub segments_count: usize,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreStats {
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
