pub mod face_store;
