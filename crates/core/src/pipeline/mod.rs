pub mod face_image_use_case;
pub mod face_lifecycle_manager;
pub mod face_validation;
