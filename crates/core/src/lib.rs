//! Face matching: embedding normalization, cosine scoring and match
//! decisions over a pluggable face store, plus ONNX-based embedding
//! extraction from images.

pub mod extraction;
pub mod matching;
pub mod pipeline;
pub mod shared;
pub mod storage;
