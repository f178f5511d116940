use std::path::Path;

use crate::extraction::domain::embedding_extractor::{
    EmbeddingExtractor, ExtractedFace, ExtractionError,
};
use crate::extraction::domain::face_detector::FaceDetector;
use crate::extraction::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ProgressFn, FACE_DETECTOR_MODEL, FACE_EMBEDDING_MODEL};

use super::arcface_embedder::ArcFaceEmbedder;
use super::onnx_yolo_detector::{self, OnnxYoloDetector};

/// Extra context around the detected box, as a fraction of its longer side.
pub const DEFAULT_CROP_MARGIN: f64 = 0.2;

/// Detect-then-embed extractor.
///
/// Decodes the image, keeps detections at or above `min_confidence` and
/// embeds the first of them (detectors return strongest first).
pub struct DetectingEmbeddingExtractor {
    detector: Box<dyn FaceDetector>,
    embedder: Box<dyn FaceEmbedder>,
    min_confidence: f64,
    crop_margin: f64,
}

impl DetectingEmbeddingExtractor {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        embedder: Box<dyn FaceEmbedder>,
        min_confidence: f64,
    ) -> Self {
        Self {
            detector,
            embedder,
            min_confidence,
            crop_margin: DEFAULT_CROP_MARGIN,
        }
    }

    pub fn with_crop_margin(mut self, margin: f64) -> Self {
        self.crop_margin = margin;
        self
    }

    /// Builds the ONNX YOLO + ArcFace pair, downloading model files into
    /// the cache on first use.
    pub fn from_default_models(
        bundled_dir: Option<&Path>,
        min_confidence: f64,
        progress: impl Fn(&str, u64, u64) + Send + Clone + 'static,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector_path = model_resolver::resolve(
            FACE_DETECTOR_MODEL,
            bundled_dir,
            Some(named_progress(FACE_DETECTOR_MODEL.name, progress.clone())),
        )?;
        let embedder_path = model_resolver::resolve(
            FACE_EMBEDDING_MODEL,
            bundled_dir,
            Some(named_progress(FACE_EMBEDDING_MODEL.name, progress)),
        )?;

        // The detector's own floor never drops a face the caller would keep.
        let detector_floor = min_confidence.min(onnx_yolo_detector::DEFAULT_CONFIDENCE);
        let detector = OnnxYoloDetector::new(&detector_path, detector_floor)?;
        let embedder = ArcFaceEmbedder::new(&embedder_path)?;
        log::info!(
            "Face models ready ({}, {})",
            detector_path.display(),
            embedder_path.display()
        );
        Ok(Self::new(
            Box::new(detector),
            Box::new(embedder),
            min_confidence,
        ))
    }
}

fn named_progress(
    name: &'static str,
    progress: impl Fn(&str, u64, u64) + Send + 'static,
) -> ProgressFn {
    Box::new(move |downloaded, total| progress(name, downloaded, total))
}

impl EmbeddingExtractor for DetectingEmbeddingExtractor {
    fn extract(&mut self, image: &[u8]) -> Result<ExtractedFace, ExtractionError> {
        let frame = Frame::decode(image).map_err(|e| ExtractionError::InvalidImage(e.to_string()))?;
        if frame.is_empty() {
            return Err(ExtractionError::InvalidImage("image has no pixels".into()));
        }

        let faces: Vec<_> = self
            .detector
            .detect(&frame)
            .map_err(|e| ExtractionError::Inference(e.to_string()))?
            .into_iter()
            .filter(|r| r.confidence >= self.min_confidence)
            .collect();

        let Some(face) = faces.first() else {
            log::warn!("No faces detected with sufficient confidence");
            return Err(ExtractionError::NoFaceDetected);
        };
        if faces.len() > 1 {
            log::warn!("Multiple faces detected ({}), using the first one", faces.len());
        }

        let crop = frame.square_crop(face, self.crop_margin);
        if crop.is_empty() {
            return Err(ExtractionError::NoFaceDetected);
        }

        let embedding = self
            .embedder
            .embed(&crop)
            .map_err(|e| ExtractionError::Inference(e.to_string()))?;
        log::info!(
            "Extracted face embedding with confidence {:.3}",
            face.confidence
        );

        Ok(ExtractedFace {
            embedding,
            confidence: face.confidence,
            faces_detected: faces.len(),
        })
    }
}
