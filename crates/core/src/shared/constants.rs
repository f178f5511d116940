pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Output dimension of the ArcFace embedding model.
pub const EMBEDDING_DIMENSION: usize = 512;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;
pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.5;

pub const MAX_PERSON_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 1000;

pub const DEFAULT_COLLECTION_NAME: &str = "face_embeddings";
pub const DISTANCE_METRIC: &str = "Cosine";
