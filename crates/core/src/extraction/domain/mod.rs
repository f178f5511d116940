pub mod embedding_extractor;
pub mod face_detector;
pub mod face_embedder;
