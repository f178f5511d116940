use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::embedding::Embedding;
use crate::shared::face_record::{FaceRecord, FaceSummary, MatchCandidate, NewFace, StoreStats};
use crate::storage::domain::face_store::{ensure_dimension, FaceStore, StoreError};
use crate::storage::infrastructure::in_memory_face_store::{new_face_id, InMemoryFaceStore};

const FORMAT_VERSION: u32 = 1;

/// Face store persisted as a single JSON document.
///
/// Reads are served from memory. Every mutation rewrites the document via a
/// temp file and rename; if that write fails the mutation is undone, so the
/// in-memory view never runs ahead of the file.
pub struct JsonFileFaceStore {
    path: PathBuf,
    inner: InMemoryFaceStore,
}

#[derive(Serialize, Deserialize)]
struct FaceFile {
    version: u32,
    dimension: usize,
    faces: Vec<StoredFace>,
}

#[derive(Serialize, Deserialize)]
struct StoredFace {
    face_id: String,
    person_name: String,
    #[serde(default)]
    description: Option<String>,
    created_at: DateTime<Utc>,
    embedding: Vec<f32>,
}

impl From<&FaceRecord> for StoredFace {
    fn from(r: &FaceRecord) -> Self {
        Self {
            face_id: r.face_id.clone(),
            person_name: r.person_name.clone(),
            description: r.description.clone(),
            created_at: r.created_at,
            embedding: r.embedding.as_slice().to_vec(),
        }
    }
}

impl JsonFileFaceStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, dimension: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let records = if path.exists() {
            load(&path, dimension)?
        } else {
            Vec::new()
        };
        log::debug!("Opened {} with {} faces", path.display(), records.len());
        Ok(Self {
            inner: InMemoryFaceStore::with_records(dimension, records),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &[FaceRecord]) -> Result<(), StoreError> {
        let document = FaceFile {
            version: FORMAT_VERSION,
            dimension: self.inner.dimension(),
            faces: records.iter().map(StoredFace::from).collect(),
        };
        let json = serde_json::to_vec_pretty(&document)?;
        write_atomically(&self.path, &json)
    }
}

fn io_err(path: &Path) -> impl Fn(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn load(path: &Path, dimension: usize) -> Result<Vec<FaceRecord>, StoreError> {
    let raw = fs::read(path).map_err(io_err(path))?;
    let document: FaceFile = serde_json::from_slice(&raw)?;
    if document.dimension != dimension {
        return Err(StoreError::DimensionMismatch {
            expected: dimension,
            actual: document.dimension,
        });
    }

    document
        .faces
        .into_iter()
        .map(|f| -> Result<FaceRecord, StoreError> {
            let embedding = Embedding::normalize(&f.embedding).map_err(|e| {
                StoreError::InvalidResponse(format!("face {} has a bad embedding: {e}", f.face_id))
            })?;
            ensure_dimension(dimension, &embedding)?;
            Ok(FaceRecord {
                face_id: f.face_id,
                person_name: f.person_name,
                description: f.description,
                embedding,
                created_at: f.created_at,
            })
        })
        .collect()
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result.map_err(io_err(path))
}

impl FaceStore for JsonFileFaceStore {
    fn store(&self, face: NewFace) -> Result<String, StoreError> {
        ensure_dimension(self.inner.dimension(), &face.embedding)?;
        let face_id = new_face_id();

        let mut records = self.inner.write()?;
        records.push(face.into_record(face_id.clone()));
        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }
        log::debug!("Persisted face {face_id} to {}", self.path.display());
        Ok(face_id)
    }

    fn search(
        &self,
        query: &Embedding,
        limit: usize,
        score_threshold: f64,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        self.inner.search(query, limit, score_threshold)
    }

    fn fetch(&self, face_id: &str) -> Result<Option<FaceRecord>, StoreError> {
        self.inner.fetch(face_id)
    }

    fn delete(&self, face_id: &str) -> Result<bool, StoreError> {
        let mut records = self.inner.write()?;
        let Some(index) = records.iter().position(|r| r.face_id == face_id) else {
            return Ok(false);
        };
        let removed = records.remove(index);
        if let Err(e) = self.persist(&records) {
            records.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }

    fn list(&self, limit: usize) -> Result<Vec<FaceSummary>, StoreError> {
        self.inner.list(limit)
    }

    fn stats(&self) -> StoreStats {
        self.inner.stats_named(&self.path.display().to_string())
    }

    fn clear(&self) -> Result<bool, StoreError> {
        let mut records = self.inner.write()?;
        let previous = std::mem::take(&mut *records);
        if let Err(e) = self.persist(&records) {
            *records = previous;
            return Err(e);
        }
        Ok(true)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
