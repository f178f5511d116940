use ndarray::ArrayView3;

use crate::shared::region::Region;

/// A decoded image: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at the decode boundary only; detectors and
/// embedders consume this type.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Decodes any format the `image` crate recognises into RGB.
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::new(rgb.into_raw(), width, height))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Square crop centred on `region`, grown by `margin` (fraction of the
    /// longer side) and clamped to the frame bounds.
    pub fn square_crop(&self, region: &Region, margin: f64) -> Frame {
        let fw = self.width as i64;
        let fh = self.height as i64;

        let (cx, cy) = region.center();
        let side = (region.width.max(region.height) * (1.0 + margin)).max(1.0);
        let half = side / 2.0;

        let x1 = ((cx - half).floor() as i64).clamp(0, fw);
        let y1 = ((cy - half).floor() as i64).clamp(0, fh);
        let x2 = ((cx + half).ceil() as i64).clamp(0, fw);
        let y2 = ((cy + half).ceil() as i64).clamp(0, fh);

        let crop_w = (x2 - x1) as usize;
        let crop_h = (y2 - y1) as usize;
        let row_bytes = self.width as usize * CHANNELS;

        let mut data = Vec::with_capacity(crop_w * crop_h * CHANNELS);
        for row in y1 as usize..y2 as usize {
            let start = row * row_bytes + x1 as usize * CHANNELS;
            data.extend_from_slice(&self.data[start..start + crop_w * CHANNELS]);
        }

        Frame::new(data, crop_w as u32, crop_h as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height)
    }

    fn region(x: f64, y: f64, w: f64, h: f64) -> Region {
        Region {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_as_ndarray_shape_and_pixels() {
        let frame = gradient(4, 2);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 3, 0]], 3);
        assert_eq!(arr[[1, 3, 1]], 1);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2);
    }

    #[test]
    fn test_decode_png_roundtrip_dimensions() {
        let img = image::RgbImage::from_pixel(7, 5, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!((frame.width(), frame.height()), (7, 5));
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Frame::decode(b"definitely not an image").is_err());
    }

    #[test]
    fn test_square_crop_inside_frame() {
        let frame = gradient(100, 100);
        let crop = frame.square_crop(&region(40.0, 40.0, 20.0, 10.0), 0.0);
        assert_eq!((crop.width(), crop.height()), (20, 20));
        // top-left pixel of the crop comes from (x=40, y=35)
        assert_eq!(&crop.data()[..2], &[40, 35]);
    }

    #[test]
    fn test_square_crop_margin_grows_crop() {
        let frame = gradient(100, 100);
        let crop = frame.square_crop(&region(40.0, 40.0, 20.0, 20.0), 0.5);
        assert_eq!((crop.width(), crop.height()), (30, 30));
    }

    #[test]
    fn test_square_crop_clamped_at_edges() {
        let frame = gradient(50, 50);
        let crop = frame.square_crop(&region(-10.0, 40.0, 30.0, 30.0), 0.0);
        assert_eq!(crop.width(), 20);
        assert_eq!(crop.height(), 10);
        assert!(!crop.is_empty());
    }
}
