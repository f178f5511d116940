use std::sync::Arc;

use chrono::Utc;

use crate::matching::domain::match_decision::decide;
use crate::matching::domain::threshold::Threshold;
use crate::pipeline::face_validation::{
    validate_confidence, validate_description, validate_limit, validate_person_name,
};
use crate::shared::constants::DEFAULT_DETECTION_CONFIDENCE;
use crate::shared::embedding::Embedding;
use crate::shared::error::{FaceMatchError, ValidationError};
use crate::shared::face_record::{
    FaceRecord, FaceSummary, NewFace, RegisteredFace, StoreStats, VerificationResult,
};
use crate::storage::domain::face_store::FaceStore;

/// Register / verify / browse operations over a face store.
///
/// Holds no state of its own between calls; every operation validates its
/// input before touching the store.
pub struct FaceLifecycleManager {
    store: Arc<dyn FaceStore>,
    min_detection_confidence: f64,
}

impl FaceLifecycleManager {
    pub fn new(store: Arc<dyn FaceStore>) -> Self {
        Self {
            store,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }

    /// Minimum detection confidence for registration, finite and in `[0, 1]`.
    pub fn with_min_detection_confidence(
        mut self,
        minimum: f64,
    ) -> Result<Self, ValidationError> {
        validate_confidence(minimum, 0.0)?;
        self.min_detection_confidence = minimum;
        Ok(self)
    }

    pub fn min_detection_confidence(&self) -> f64 {
        self.min_detection_confidence
    }

    pub fn store(&self) -> &Arc<dyn FaceStore> {
        &self.store
    }

    pub fn register(
        &self,
        raw_embedding: &[f32],
        confidence: f64,
        person_name: &str,
        description: Option<&str>,
    ) -> Result<RegisteredFace, FaceMatchError> {
        let person_name = validate_person_name(person_name)?;
        let description = validate_description(description)?;
        validate_confidence(confidence, self.min_detection_confidence)?;

        let embedding = Embedding::normalize(raw_embedding)?;
        embedding.ensure_dimension(self.store.dimension())?;
        let embedding_size = embedding.dimension();
        let created_at = Utc::now();

        let face_id = self.store.store(NewFace {
            embedding,
            person_name: person_name.clone(),
            description: description.clone(),
            created_at,
        })?;
        log::info!("Registered face for {person_name} with ID {face_id}");

        Ok(RegisteredFace {
            face_id,
            person_name,
            description,
            embedding_size,
            confidence,
            created_at,
        })
    }

    /// Decides whether `raw_embedding` belongs to a registered face.
    ///
    /// The threshold is checked before anything else; an invalid one never
    /// reaches the store.
    pub fn verify(
        &self,
        raw_embedding: &[f32],
        confidence: f64,
        threshold: f64,
    ) -> Result<VerificationResult, FaceMatchError> {
        let threshold = Threshold::new(threshold)?;
        validate_confidence(confidence, 0.0)?;

        let query = Embedding::normalize(raw_embedding)?;
        query.ensure_dimension(self.store.dimension())?;

        let candidates = self.store.search(&query, 1, threshold.value())?;
        let result = decide(&candidates, threshold, confidence);
        log::info!(
            "Verification: match={} score={:.4} threshold={}",
            result.is_match,
            result.similarity_score,
            threshold.value()
        );
        Ok(result)
    }

    pub fn list(&self, limit: usize) -> Result<Vec<FaceSummary>, FaceMatchError> {
        let limit = validate_limit(limit)?;
        Ok(self.store.list(limit)?)
    }

    pub fn fetch(&self, face_id: &str) -> Result<Option<FaceRecord>, FaceMatchError> {
        Ok(self.store.fetch(face_id)?)
    }

    pub fn delete(&self, face_id: &str) -> Result<bool, FaceMatchError> {
        let deleted = self.store.delete(face_id)?;
        if deleted {
            log::info!("Deleted face {face_id}");
        }
        Ok(deleted)
    }

    pub fn clear(&self) -> Result<bool, FaceMatchError> {
        let cleared = self.store.clear()?;
        log::warn!("Cleared all registered faces");
        Ok(cleared)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Healthy iff the store can report its statistics.
    pub fn health(&self) -> bool {
        !self.stats().is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::embedding::EmbeddingError;
    use crate::shared::error::ErrorKind;
    use crate::shared::face_record::MatchCandidate;
    use crate::storage::domain::face_store::StoreError;
    use crate::storage::infrastructure::in_memory_face_store::InMemoryFaceStore;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const A: [f32; 4] = [0.9, 0.1, 0.3, 0.2];
    const B: [f32; 4] = [-0.2, 0.8, 0.1, 0.5];

    fn manager() -> FaceLifecycleManager {
        FaceLifecycleManager::new(Arc::new(InMemoryFaceStore::new(4)))
    }

    /// Counts every call and fails all of them.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn bump(&self) -> StoreError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StoreError::Unavailable("down".into())
        }
    }

    impl FaceStore for CountingStore {
        fn store(&self, _face: NewFace) -> Result<String, StoreError> {
            Err(self.bump())
        }
        fn search(
            &self,
            _query: &Embedding,
            _limit: usize,
            _score_threshold: f64,
        ) -> Result<Vec<MatchCandidate>, StoreError> {
            Err(self.bump())
        }
        fn fetch(&self, _face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
            Err(self.bump())
        }
        fn delete(&self, _face_id: &str) -> Result<bool, StoreError> {
            Err(self.bump())
        }
        fn list(&self, _limit: usize) -> Result<Vec<FaceSummary>, StoreError> {
            Err(self.bump())
        }
        fn stats(&self) -> StoreStats {
            let e = self.bump();
            StoreStats {
                collection_name: "counting".into(),
                record_count: 0,
                vector_dimension: 4,
                distance_metric: "Cosine".into(),
                segments_count: 0,
                status: "unknown".into(),
                error: Some(e.to_string()),
            }
        }
        fn clear(&self) -> Result<bool, StoreError> {
            Err(self.bump())
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    #[test]
    fn test_register_then_verify_same_embedding() {
        let m = manager();
        let registered = m.register(&A, 0.9, "Alice", None).unwrap();

        let result = m.verify(&A, 0.88, 0.6).unwrap();
        assert!(result.is_match);
        assert_eq!(result.matched_face_id, Some(registered.face_id));
        assert_eq!(result.matched_person_name.as_deref(), Some("Alice"));
        assert_relative_eq!(result.similarity_score, 1.0, epsilon = 1e-6);
        assert_eq!(result.confidence, 0.88);
        assert_eq!(result.threshold_used, 0.6);
    }

    #[test]
    fn test_verify_against_empty_store() {
        let result = manager().verify(&B, 0.9, 0.6).unwrap();
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, 0.0);
        assert_eq!(result.matched_face_id, None);
        assert_eq!(result.matched_person_name, None);
    }

    #[test]
    fn test_verify_dissimilar_face_is_no_match() {
        let m = manager();
        m.register(&A, 0.9, "Alice", None).unwrap();
        let result = m.verify(&B, 0.9, 0.6).unwrap();
        assert!(!result.is_match);
        assert_eq!(result.matched_face_id, None);
    }

    #[test]
    fn test_verify_scales_raw_embedding() {
        let m = manager();
        m.register(&A, 0.9, "Alice", None).unwrap();
        let scaled: Vec<f32> = A.iter().map(|v| v * 42.0).collect();
        assert!(m.verify(&scaled, 0.9, 0.99).unwrap().is_match);
    }

    #[test]
    fn test_invalid_threshold_never_reaches_store() {
        let store = Arc::new(CountingStore::default());
        let m = FaceLifecycleManager::new(store.clone());

        let err = m.verify(&A, 0.9, 1.5).unwrap_err();
        assert!(matches!(
            err,
            FaceMatchError::Validation(ValidationError::Threshold(_))
        ));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_registration_never_reaches_store() {
        let store = Arc::new(CountingStore::default());
        let m = FaceLifecycleManager::new(store.clone());

        assert!(m.register(&A, 0.9, "  ", None).is_err());
        assert!(m.register(&A, 0.9, "Alice", Some(&"d".repeat(501))).is_err());
        assert!(m.register(&A, 0.2, "Alice", None).is_err());
        assert!(m.register(&[0.0; 4], 0.9, "Alice", None).is_err());
        assert!(m.register(&[1.0, 0.0], 0.9, "Alice", None).is_err());
        assert!(m.list(0).is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_failure_is_collaborator_error() {
        let m = FaceLifecycleManager::new(Arc::new(CountingStore::default()));
        let err = m.register(&A, 0.9, "Alice", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
        assert!(!err.is_client_fault());
        assert!(m.verify(&A, 0.9, 0.6).is_err());
        assert!(!m.health());
    }

    #[test]
    fn test_register_returns_summary() {
        let registered = manager()
            .register(&A, 0.93, "  Alice  ", Some("badge photo"))
            .unwrap();
        assert_eq!(registered.person_name, "Alice");
        assert_eq!(registered.description.as_deref(), Some("badge photo"));
        assert_eq!(registered.embedding_size, 4);
        assert_eq!(registered.confidence, 0.93);
    }

    #[test]
    fn test_register_below_minimum_confidence() {
        let m = manager().with_min_detection_confidence(0.8).unwrap();
        let err = m.register(&A, 0.79, "Alice", None).unwrap_err();
        assert!(matches!(
            err,
            FaceMatchError::Validation(ValidationError::LowConfidence { .. })
        ));
        assert!(m.register(&A, 0.8, "Alice", None).is_ok());
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(-0.1)]
    #[case(1.5)]
    fn test_minimum_confidence_must_be_a_probability(#[case] minimum: f64) {
        assert!(matches!(
            manager().with_min_detection_confidence(minimum),
            Err(ValidationError::Confidence(_))
        ));
    }

    #[test]
    fn test_zero_threshold_rejects_opposite_face() {
        let m = manager();
        m.register(&A, 0.9, "Alice", None).unwrap();
        let opposite: Vec<f32> = A.iter().map(|v| -v).collect();

        let result = m.verify(&opposite, 0.9, 0.0).unwrap();
        assert!(!result.is_match);
        assert_eq!(result.similarity_score, 0.0);
        assert_eq!(result.matched_face_id, None);
    }

    #[test]
    fn test_verify_ignores_minimum_confidence() {
        let m = manager().with_min_detection_confidence(0.8).unwrap();
        assert!(m.verify(&A, 0.3, 0.6).is_ok());
    }

    #[test]
    fn test_wrong_dimension_is_invariant_violation() {
        let err = manager().verify(&[1.0, 0.0], 0.9, 0.6).unwrap_err();
        assert!(matches!(
            err,
            FaceMatchError::Embedding(EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_degenerate_embedding_is_client_fault() {
        let err = manager().verify(&[0.0; 4], 0.9, 0.6).unwrap_err();
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_register_then_fetch_round_trips() {
        let m = manager();
        let registered = m.register(&A, 0.9, "Alice", Some("lobby")).unwrap();

        let record = m.fetch(&registered.face_id).unwrap().unwrap();
        assert_eq!(record.person_name, "Alice");
        assert_eq!(record.description.as_deref(), Some("lobby"));
        assert_eq!(record.embedding_size(), registered.embedding_size);
        assert_eq!(record.created_at, registered.created_at);
    }

    #[test]
    fn test_delete_and_fetch_absent() {
        let m = manager();
        let id = m.register(&A, 0.9, "Alice", None).unwrap().face_id;

        assert!(m.delete(&id).unwrap());
        assert!(!m.delete(&id).unwrap());
        assert!(!m.delete("unknown").unwrap());
        assert!(m.fetch(&id).unwrap().is_none());
    }

    #[test]
    fn test_clear_then_list_is_empty() {
        let m = manager();
        m.register(&A, 0.9, "Alice", None).unwrap();
        m.register(&B, 0.9, "Bob", None).unwrap();
        assert_eq!(m.list(100).unwrap().len(), 2);

        assert!(m.clear().unwrap());
        assert!(m.list(100).unwrap().is_empty());
        assert_eq!(m.stats().record_count, 0);
        assert!(m.health());
    }

    #[test]
    fn test_duplicate_registrations_are_allowed() {
        let m = manager();
        let first = m.register(&A, 0.9, "Alice", None).unwrap();
        let second = m.register(&A, 0.9, "Alice", None).unwrap();
        assert_ne!(first.face_id, second.face_id);
        assert_eq!(m.list(10).unwrap().len(), 2);
    }
}
