/// Face store backed by a Qdrant server over its REST API.
///
/// The collection is created with cosine distance on first connect. Qdrant
/// only accepts UUIDs or unsigned integers as point ids, so ids of any
/// other shape are reported absent without a round-trip.
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::matching::domain::similarity_scorer::clamp_score;
use crate::shared::constants::DISTANCE_METRIC;
use crate::shared::embedding::Embedding;
use crate::shared::face_record::{FaceRecord, FaceSummary, MatchCandidate, NewFace, StoreStats};
use crate::storage::domain::face_store::{ensure_dimension, FaceStore, StoreError};
use crate::storage::infrastructure::in_memory_face_store::new_face_id;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>, dimension: usize) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            dimension,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct QdrantFaceStore {
    client: Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

impl QdrantFaceStore {
    /// Connects and makes sure the collection exists with a matching
    /// vector size.
    pub fn connect(config: QdrantConfig) -> Result<Self, StoreError> {
        let store = Self::unconnected(config)?;
        store.ensure_collection()?;
        Ok(store)
    }

    fn unconnected(config: QdrantConfig) -> Result<Self, StoreError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| StoreError::Unavailable(format!("invalid api key: {e}")))?;
            headers.insert("api-key", value);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection,
            dimension: config.dimension,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = request
            .send()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> = response
            .json()
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;
        Ok(envelope.result)
    }

    fn collection_info(&self) -> Result<CollectionInfo, StoreError> {
        self.send(self.client.get(self.collection_url("")))
    }

    fn ensure_collection(&self) -> Result<(), StoreError> {
        match self.collection_info() {
            Ok(info) => {
                let size = info.config.params.vectors.size;
                if size != self.dimension {
                    return Err(StoreError::DimensionMismatch {
                        expected: self.dimension,
                        actual: size,
                    });
                }
                log::info!("Collection {} already exists", self.collection);
                Ok(())
            }
            Err(StoreError::Http { status: 404, .. }) => {
                self.create_collection()?;
                log::info!("Created collection {}", self.collection);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn create_collection(&self) -> Result<(), StoreError> {
        let body = CreateCollection {
            vectors: VectorParams {
                size: self.dimension,
                distance: DISTANCE_METRIC.to_string(),
            },
        };
        let _: serde_json::Value =
            self.send(self.client.put(self.collection_url("")).json(&body))?;
        Ok(())
    }

    fn retrieve(
        &self,
        id: &PointId,
        with_vector: bool,
    ) -> Result<Option<RetrievedPoint>, StoreError> {
        let body = RetrieveRequest {
            ids: [id],
            with_payload: true,
            with_vector,
        };
        let points: Vec<RetrievedPoint> =
            self.send(self.client.post(self.collection_url("/points")).json(&body))?;
        Ok(points.into_iter().next())
    }
}

impl FaceStore for QdrantFaceStore {
    fn store(&self, face: NewFace) -> Result<String, StoreError> {
        ensure_dimension(self.dimension, &face.embedding)?;
        let face_id = new_face_id();
        let body = UpsertRequest {
            points: [UpsertPoint {
                id: &face_id,
                vector: face.embedding.as_slice(),
                payload: FacePayload {
                    person_name: face.person_name,
                    description: face.description,
                    created_at: face.created_at,
                    embedding_size: face.embedding.dimension(),
                },
            }],
        };
        let _: serde_json::Value = self.send(
            self.client
                .put(self.collection_url("/points?wait=true"))
                .json(&body),
        )?;
        log::debug!("Upserted point {face_id} into {}", self.collection);
        Ok(face_id)
    }

    fn search(
        &self,
        query: &Embedding,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        ensure_dimension(self.dimension, query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = SearchRequest::new(query, limit, score_threshold);
        let hits: Vec<ScoredPoint> = self.send(
            self.client
                .post(self.collection_url("/points/search"))
                .json(&body),
        )?;
        hits.into_iter().map(ScoredPoint::into_candidate).collect()
    }

    fn fetch(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
        let Some(id) = parse_point_id(face_id) else {
            return Ok(None);
        };
        self.retrieve(&id, true)?
            .map(RetrievedPoint::into_record)
            .transpose()
    }

    fn delete(&self, face_id: &str) -> Result<bool, StoreError> {
        let Some(id) = parse_point_id(face_id) else {
            return Ok(false);
        };
        if self.retrieve(&id, false)?.is_none() {
            log::warn!("Face {face_id} not found");
            return Ok(false);
        }
        let body = DeleteRequest { points: [&id] };
        let _: serde_json::Value = self.send(
            self.client
                .post(self.collection_url("/points/delete?wait=true"))
                .json(&body),
        )?;
        Ok(true)
    }

    fn list(&self, limit: usize) -> Result<Vec<FaceSummary>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let body = ScrollRequest {
            limit,
            with_payload: true,
            with_vector: false,
        };
        let page: ScrollResult = self.send(
            self.client
                .post(self.collection_url("/points/scroll"))
                .json(&body),
        )?;
        page.points
            .into_iter()
            .map(|p| p.into_summary(self.dimension))
            .collect()
    }

    fn stats(&self) -> StoreStats {
        match self.collection_info() {
            Ok(info) => info.into_stats(&self.collection),
            Err(e) => {
                log::error!("Error getting collection stats: {e}");
                StoreStats {
                    collection_name: self.collection.clone(),
                    record_count: 0,
                    vector_dimension: self.dimension,
                    distance_metric: DISTANCE_METRIC.to_string(),
                    segments_count: 0,
                    status: "unknown".to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn clear(&self) -> Result<bool, StoreError> {
        let _: serde_json::Value = self.send(self.client.delete(self.collection_url("")))?;
        self.create_collection()?;
        log::info!("Cleared collection {}", self.collection);
        Ok(true)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: [UpsertPoint<'a>; 1],
}

#[derive(Serialize)]
struct UpsertPoint<'a> {
    id: &'a str,
    vector: &'a [f32],
    payload: FacePayload,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f64,
    with_payload: bool,
}

impl<'a> SearchRequest<'a> {
    /// The floor is always sent, so a zero threshold still drops
    /// anti-correlated points server side.
    fn new(query: &'a Embedding, limit: usize, score_threshold: f64) -> Self {
        Self {
            vector: query.as_slice(),
            limit,
            score_threshold,
            with_payload: true,
        }
    }
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    ids: [&'a PointId; 1],
    with_payload: bool,
    with_vector: bool,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    points: [&'a PointId; 1],
}

#[derive(Serialize)]
struct ScrollRequest {
    limit: usize,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Uuid(String),
}

/// Numeric ids go back on the wire as numbers, UUIDs as strings.
fn parse_point_id(face_id: &str) -> Option<PointId> {
    if let Ok(n) = face_id.parse::<u64>() {
        return Some(PointId::Num(n));
    }
    Uuid::parse_str(face_id)
        .ok()
        .map(|_| PointId::Uuid(face_id.to_string()))
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct FacePayload {
    person_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    embedding_size: usize,
}

/// Accepts RFC 3339 and offset-less ISO 8601 timestamps (read as UTC).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

fn missing_payload(id: &PointId) -> StoreError {
    StoreError::InvalidResponse(format!("point {id} has no face payload"))
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f64,
    payload: Option<FacePayload>,
}

impl ScoredPoint {
    fn into_candidate(self) -> Result<MatchCandidate, StoreError> {
        let payload = self.payload.ok_or_else(|| missing_payload(&self.id))?;
        Ok(MatchCandidate {
            face_id: self.id.to_string(),
            person_name: payload.person_name,
            description: payload.description,
            created_at: payload.created_at,
            similarity_score: clamp_score(self.score),
        })
    }
}

#[derive(Deserialize)]
struct RetrievedPoint {
    id: PointId,
    payload: Option<FacePayload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

impl RetrievedPoint {
    fn into_record(self) -> Result<FaceRecord, StoreError> {
        let payload = self.payload.ok_or_else(|| missing_payload(&self.id))?;
        let vector = self.vector.ok_or_else(|| {
            StoreError::InvalidResponse(format!("point {} returned without a vector", self.id))
        })?;
        let embedding = Embedding::normalize(&vector).map_err(|e| {
            StoreError::InvalidResponse(format!("point {} has a bad vector: {e}", self.id))
        })?;
        Ok(FaceRecord {
            face_id: self.id.to_string(),
            person_name: payload.person_name,
            description: payload.description,
            embedding,
            created_at: payload.created_at,
        })
    }

    fn into_summary(self, dimension: usize) -> Result<FaceSummary, StoreError> {
        let payload = self.payload.ok_or_else(|| missing_payload(&self.id))?;
        let embedding_size = match payload.embedding_size {
            0 => dimension,
            n => n,
        };
        Ok(FaceSummary {
            face_id: self.id.to_string(),
            person_name: payload.person_name,
            description: payload.description,
            created_at: payload.created_at,
            embedding_size,
        })
    }
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RetrievedPoint>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    status: String,
    #[serde(default)]
    points_count: Option<usize>,
    #[serde(default)]
    segments_count: Option<usize>,
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Serialize, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

impl CollectionInfo {
    fn into_stats(self, collection_name: &str) -> StoreStats {
        StoreStats {
            collection_name: collection_name.to_string(),
            record_count: self.points_count.unwrap_or(0),
            vector_dimension: self.config.params.vectors.size,
            distance_metric: self.config.params.vectors.distance,
            segments_count: self.segments_count.unwrap_or(0),
            status: self.status,
            error: None,
        }
    }
}
