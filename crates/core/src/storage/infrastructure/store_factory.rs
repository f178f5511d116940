use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::domain::face_store::{FaceStore, StoreError};

use super::in_memory_face_store::InMemoryFaceStore;
use super::json_file_face_store::JsonFileFaceStore;
use super::qdrant_face_store::{QdrantConfig, QdrantFaceStore};

/// Which face store backend to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Json,
    Qdrant,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Json => "json",
            StoreBackend::Qdrant => "qdrant",
        })
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "json" => Ok(StoreBackend::Json),
            "qdrant" => Ok(StoreBackend::Qdrant),
            other => Err(format!(
                "unknown store backend '{other}' (expected memory, json or qdrant)"
            )),
        }
    }
}

/// Everything needed to open any of the backends.
#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub backend: StoreBackend,
    pub dimension: usize,
    pub json_path: PathBuf,
    pub qdrant: QdrantConfig,
}

/// Opens the configured backend. Logs which one is selected.
pub fn create_store(options: StoreOptions) -> Result<Arc<dyn FaceStore>, StoreError> {
    match options.backend {
        StoreBackend::Memory => {
            log::info!("Using in-memory face store (dimension={})", options.dimension);
            Ok(Arc::new(InMemoryFaceStore::new(options.dimension)))
        }
        StoreBackend::Json => {
            log::info!(
                "Using JSON face store at {} (dimension={})",
                options.json_path.display(),
                options.dimension
            );
            Ok(Arc::new(JsonFileFaceStore::open(
                options.json_path,
                options.dimension,
            )?))
        }
        StoreBackend::Qdrant => {
            log::info!(
                "Using Qdrant face store at {} (collection={}, dimension={})",
                options.qdrant.url,
                options.qdrant.collection,
                options.dimension
            );
            let mut config = options.qdrant;
            config.dimension = options.dimension;
            Ok(Arc::new(QdrantFaceStore::connect(config)?))
        }
    }
}
