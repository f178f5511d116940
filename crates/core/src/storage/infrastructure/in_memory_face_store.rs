use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::matching::domain::candidate_ranking::rank_candidates;
use crate::shared::constants::DISTANCE_METRIC;
use crate::shared::embedding::Embedding;
use crate::shared::face_record::{FaceRecord, FaceSummary, MatchCandidate, NewFace, StoreStats};
use crate::storage::domain::face_store::{ensure_dimension, FaceStore, StoreError};

/// Process-local face store with exhaustive cosine search.
///
/// Keeps records in insertion order. Suited to tests and small galleries;
/// nothing survives the process.
pub struct InMemoryFaceStore {
    records: RwLock<Vec<FaceRecord>>,
    dimension: usize,
}

impl InMemoryFaceStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            dimension,
        }
    }

    pub(crate) fn with_records(dimension: usize, records: Vec<FaceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            dimension,
        }
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Vec<FaceRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|e| StoreError::Unavailable(format!("Lock poisoned: {e}")))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<FaceRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(format!("Lock poisoned: {e}")))
    }

    pub(crate) fn stats_named(&self, collection_name: &str) -> StoreStats {
        match self.read() {
            Ok(records) => StoreStats {
                collection_name: collection_name.to_string(),
                record_count: records.len(),
                vector_dimension: self.dimension,
                distance_metric: DISTANCE_METRIC.to_string(),
                segments_count: 1,
                status: "green".to_string(),
                error: None,
            },
            Err(e) => StoreStats {
                collection_name: collection_name.to_string(),
                record_count: 0,
                vector_dimension: self.dimension,
                distance_metric: DISTANCE_METRIC.to_string(),
                segments_count: 0,
                status: "unknown".to_string(),
                error: Some(e.to_string()),
            },
        }
    }
}

pub(crate) fn new_face_id() -> String {
    Uuid::new_v4().to_string()
}

impl FaceStore for InMemoryFaceStore {
    fn store(&self, face: NewFace) -> Result<String, StoreError> {
        ensure_dimension(self.dimension, &face.embedding)?;
        let face_id = new_face_id();
        self.write()?.push(face.into_record(face_id.clone()));
        Ok(face_id)
    }

    fn search(
        &self,
        query: &Embedding,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        ensure_dimension(self.dimension, query)?;
        let records = self.read()?;
        rank_candidates(query, records.iter(), limit, score_threshold).map_err(|e| {
            StoreError::InvalidResponse(format!("stored embedding is inconsistent: {e}"))
        })
    }

    fn fetch(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
        Ok(self.read()?.iter().find(|r| r.face_id == face_id).cloned())
    }

    fn delete(&self, face_id: &str) -> Result<bool, StoreError> {
        let mut records = self.write()?;
        match records.iter().position(|r| r.face_id == face_id) {
            Some(index) => {
                records.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self, limit: usize) -> Result<Vec<FaceSummary>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .take(limit)
            .map(FaceRecord::summary)
            .collect())
    }

    fn stats(&self) -> StoreStats {
        self.stats_named("memory")
    }

    fn clear(&self) -> Result<bool, StoreError> {
        self.write()?.clear();
        Ok(true)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn new_face(name: &str, raw: &[f32]) -> NewFace {
        NewFace {
            embedding: Embedding::normalize(raw).unwrap(),
            person_name: name.into(),
            description: Some(format!("{name} badge photo")),
            created_at: Utc::now(),
        }
    }

    fn emb(raw: &[f32]) -> Embedding {
        Embedding::normalize(raw).unwrap()
    }

    #[test]
    fn test_store_then_fetch() {
        let store = InMemoryFaceStore::new(3);
        let id = store.store(new_face("Alice", &[1.0, 2.0, 3.0])).unwrap();

        let record = store.fetch(&id).unwrap().unwrap();
        assert_eq!(record.face_id, id);
        assert_eq!(record.person_name, "Alice");
        assert_eq!(record.description.as_deref(), Some("Alice badge photo"));
        assert_eq!(record.embedding, emb(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_store_assigns_unique_ids() {
        let store = InMemoryFaceStore::new(2);
        let ids: HashSet<String> = (0..50)
            .map(|_| store.store(new_face("Bob", &[1.0, 0.0])).unwrap())
            .collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_store_rejects_wrong_dimension() {
        let store = InMemoryFaceStore::new(4);
        let err = store.store(new_face("Alice", &[1.0, 0.0])).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));
        assert_eq!(store.stats().record_count, 0);
    }

    #[test]
    fn test_search_ranks_and_filters() {
        let store = InMemoryFaceStore::new(3);
        let a = store.store(new_face("a", &[1.0, 0.0, 0.0])).unwrap();
        store.store(new_face("b", &[0.0, 1.0, 0.0])).unwrap();
        let c = store.store(new_face("c", &[0.9, 0.1, 0.0])).unwrap();

        let hits = store.search(&emb(&[1.0, 0.0, 0.0]), 10, 0.5).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].face_id, a);
        assert_relative_eq!(hits[0].similarity_score, 1.0, epsilon = 1e-6);
        assert_eq!(hits[1].face_id, c);
    }

    #[test]
    fn test_search_empty_store() {
        let store = InMemoryFaceStore::new(2);
        assert!(store.search(&emb(&[1.0, 0.0]), 1, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let store = InMemoryFaceStore::new(3);
        assert!(matches!(
            store.search(&emb(&[1.0, 0.0]), 1, 0.0),
            Err(StoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_delete_existing_and_unknown() {
        let store = InMemoryFaceStore::new(2);
        let id = store.store(new_face("a", &[1.0, 0.0])).unwrap();

        assert!(store.delete(&id).unwrap());
        assert!(store.fetch(&id).unwrap().is_none());
        assert!(!store.delete(&id).unwrap());
        assert!(!store.delete("never-existed").unwrap());
    }

    #[test]
    fn test_list_respects_limit_and_insertion_order() {
        let store = InMemoryFaceStore::new(2);
        let ids: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|n| store.store(new_face(n, &[1.0, 1.0])).unwrap())
            .collect();

        let listed = store.list(2).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].face_id, ids[0]);
        assert_eq!(listed[1].face_id, ids[1]);
        assert_eq!(listed[0].embedding_size, 2);
    }

    #[test]
    fn test_clear_empties_store() {
        let store = InMemoryFaceStore::new(2);
        store.store(new_face("a", &[1.0, 0.0])).unwrap();
        store.store(new_face("b", &[0.0, 1.0])).unwrap();

        assert!(store.clear().unwrap());
        assert!(store.list(100).unwrap().is_empty());
        assert_eq!(store.stats().record_count, 0);
    }

    #[test]
    fn test_stats_reports_configuration() {
        let store = InMemoryFaceStore::new(512);
        let stats = store.stats();
        assert_eq!(stats.vector_dimension, 512);
        assert_eq!(stats.distance_metric, "Cosine");
        assert!(!stats.is_degraded());
    }

    #[test]
    fn test_concurrent_registrations() {
        let store = Arc::new(InMemoryFaceStore::new(2));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store
                            .store(new_face(&format!("p{i}"), &[1.0, i as f32]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.stats().record_count, 80);
    }
}
