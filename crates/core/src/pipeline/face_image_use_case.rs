use std::sync::Mutex;

use crate::extraction::domain::embedding_extractor::{
    EmbeddingExtractor, ExtractedFace, ExtractionError,
};
use crate::matching::domain::threshold::Threshold;
use crate::pipeline::face_lifecycle_manager::FaceLifecycleManager;
use crate::pipeline::face_validation::{validate_description, validate_person_name};
use crate::shared::error::FaceMatchError;
use crate::shared::face_record::{RegisteredFace, VerificationResult};

/// Image-in pipeline: extract → normalize → register or verify.
///
/// Cheap input checks run before the (expensive) model inference.
pub struct FaceImageUseCase {
    extractor: Mutex<Box<dyn EmbeddingExtractor>>,
    manager: FaceLifecycleManager,
}

impl FaceImageUseCase {
    pub fn new(extractor: Box<dyn EmbeddingExtractor>, manager: FaceLifecycleManager) -> Self {
        Self {
            extractor: Mutex::new(extractor),
            manager,
        }
    }

    pub fn manager(&self) -> &FaceLifecycleManager {
        &self.manager
    }

    pub fn register_image(
        &self,
        image: &[u8],
        person_name: &str,
        description: Option<&str>,
    ) -> Result<RegisteredFace, FaceMatchError> {
        validate_person_name(person_name)?;
        validate_description(description)?;

        let face = self.extract(image)?;
        self.manager
            .register(&face.embedding, face.confidence, person_name, description)
    }

    pub fn verify_image(
        &self,
        image: &[u8],
        threshold: f64,
    ) -> Result<VerificationResult, FaceMatchError> {
        Threshold::new(threshold)?;

        let face = self.extract(image)?;
        self.manager
            .verify(&face.embedding, face.confidence, threshold)
    }

    fn extract(&self, image: &[u8]) -> Result<ExtractedFace, FaceMatchError> {
        let mut extractor = self
            .extractor
            .lock()
            .map_err(|e| ExtractionError::Inference(format!("Lock poisoned: {e}")))?;
        Ok(extractor.extract(image)?)
    }
}
