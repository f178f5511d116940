pub mod arcface_embedder;
pub mod detecting_embedding_extractor;
mod onnx_session;
pub mod onnx_yolo_detector;
