use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use facematch_core::matching::domain::threshold::Threshold;
use facematch_core::pipeline::face_validation::validate_confidence;
use facematch_core::shared::constants::{
    DEFAULT_COLLECTION_NAME, DEFAULT_DETECTION_CONFIDENCE, DEFAULT_MATCH_THRESHOLD,
    EMBEDDING_DIMENSION,
};
use facematch_core::storage::infrastructure::qdrant_face_store::DEFAULT_QDRANT_URL;
use facematch_core::shared::error::ValidationError;
use facematch_core::storage::infrastructure::store_factory::StoreBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreBackend,
    /// JSON store location; defaults to the user data directory.
    pub store_path: Option<PathBuf>,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub qdrant_timeout_secs: u64,
    pub collection: String,
    pub dimension: usize,
    pub match_threshold: f64,
    pub detection_confidence: f64,
    /// Directory checked for model files before downloading.
    pub models_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreBackend::default(),
            store_path: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            qdrant_timeout_secs: 10,
            collection: DEFAULT_COLLECTION_NAME.to_string(),
            dimension: EMBEDDING_DIMENSION,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            models_dir: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceMatch").join("settings.json"))
    }

    /// Settings from the default location, or defaults when there are none.
    pub fn load() -> Self {
        let Some(path) = Self::config_path().filter(|p| p.exists()) else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring unreadable settings: {e}");
                Self::default()
            }
        }
    }

    /// Settings from an explicit file, which must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
        let settings: Self = serde_json::from_str(&json)
            .map_err(|e| format!("Invalid settings {}: {e}", path.display()))?;
        settings
            .validate()
            .map_err(|e| format!("Invalid settings {}: {e}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Both thresholds must be finite and in `[0, 1]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Threshold::new(self.match_threshold)?;
        validate_confidence(self.detection_confidence, 0.0)
    }

    pub fn json_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("FaceMatch")
                .join("faces.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{"store": "qdrant", "collection": "staff"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.store, StoreBackend::Qdrant);
        assert_eq!(settings.collection, "staff");
        assert_eq!(settings.dimension, EMBEDDING_DIMENSION);
        assert_eq!(settings.match_threshold, DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Settings::load_from(&tmp.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ store: ").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[rstest]
    #[case(r#"{"detection_confidence": 1.5}"#)]
    #[case(r#"{"detection_confidence": -0.1}"#)]
    #[case(r#"{"match_threshold": 2.0}"#)]
    fn test_out_of_range_thresholds_are_error(#[case] json: &str) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, json).unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_nan_detection_confidence_is_invalid() {
        let settings = Settings {
            detection_confidence: f64::NAN,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ValidationError::Confidence(_))
        ));
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let settings = Settings {
            store_path: Some(PathBuf::from("/srv/faces.json")),
            ..Settings::default()
        };
        assert_eq!(settings.json_store_path(), PathBuf::from("/srv/faces.json"));
        assert!(Settings::default().json_store_path().ends_with("FaceMatch/faces.json"));
    }
}
