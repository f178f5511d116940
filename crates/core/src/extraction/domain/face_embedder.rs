use crate::shared::frame::Frame;

/// Maps a face crop to the model's raw (unnormalized) embedding vector.
pub trait FaceEmbedder: Send {
    fn embed(&self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
