/// ArcFace face embedder using ONNX Runtime.
///
/// Produces the model's raw 512-d output; unit normalization is left to the
/// matching pipeline so every embedding source goes through the same path.
use std::path::Path;
use std::sync::Mutex;

use crate::extraction::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;

use super::onnx_session::open_session;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct ArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: Mutex::new(open_session(model_path)?),
        })
    }
}

impl FaceEmbedder for ArcFaceEmbedder {
    fn embed(&self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        if face.is_empty() {
            return Err("Cannot embed an empty face crop".into());
        }
        let tensor = preprocess(face.data(), face.width(), face.height());
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;
        Ok(embedding_slice.to_vec())
    }
}

/// Resize crop to 112x112, normalize, NCHW layout.
fn preprocess(rgb_data: &[u8], width: u32, height: u32) -> ndarray::Array4<f32> {
    let src_w = width as usize;
    let src_h = height as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            let offset = (src_y * src_w + src_x) * 3;
            if offset + 2 < rgb_data.len() {
                for c in 0..3 {
                    tensor[[0, c, y, x]] = (rgb_data[offset + c] as f32 - NORM_MEAN) / NORM_STD;
                }
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_preprocess_shape() {
        let data = vec![128u8; 50 * 50 * 3];
        let tensor = preprocess(&data, 50, 50);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let dark = preprocess(&vec![0u8; 10 * 10 * 3], 10, 10);
        let bright = preprocess(&vec![255u8; 10 * 10 * 3], 10, 10);
        assert_abs_diff_eq!(dark[[0, 0, 0, 0]], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bright[[0, 2, 111, 111]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_preprocess_keeps_channel_order() {
        // Single red pixel upscaled to the full input.
        let tensor = preprocess(&[255, 0, 0], 1, 1);
        assert_abs_diff_eq!(tensor[[0, 0, 56, 56]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(tensor[[0, 1, 56, 56]], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(tensor[[0, 2, 56, 56]], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_preprocess_non_square_crop() {
        // Left half black, right half white.
        let (w, h) = (20usize, 10usize);
        let mut data = Vec::with_capacity(w * h * 3);
        for _ in 0..h {
            for x in 0..w {
                let v = if x < w / 2 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let tensor = preprocess(&data, w as u32, h as u32);
        assert!(tensor[[0, 0, 50, 10]] < 0.0);
        assert!(tensor[[0, 0, 50, 100]] > 0.0);
    }
}
