use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("could not decode image: {0}")]
    InvalidImage(String),
    #[error("no face detected with sufficient confidence")]
    NoFaceDetected,
    #[error("face model inference failed: {0}")]
    Inference(String),
}

/// One face pulled out of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFace {
    /// Raw model output; normalization happens downstream.
    pub embedding: Vec<f32>,
    /// Detector confidence for the chosen face.
    pub confidence: f64,
    /// How many faces cleared the confidence floor.
    pub faces_detected: usize,
}

/// Turns encoded image bytes into a single face embedding.
///
/// When several faces are present the implementation picks one.
pub trait EmbeddingExtractor: Send {
    fn extract(&mut self, image: &[u8]) -> Result<ExtractedFace, ExtractionError>;
}
