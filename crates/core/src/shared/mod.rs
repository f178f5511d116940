pub mod constants;
pub mod embedding;
pub mod error;
pub mod face_record;
pub mod frame;
pub mod model_resolver;
pub mod region;
