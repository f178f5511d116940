pub mod in_memory_face_store;
pub mod json_file_face_store;
pub mod qdrant_face_store;
pub mod store_factory;
