//! Image normalization for classifier input.
//!
//! Every disease classifier consumes the same tensor shape: grayscale,
//! 150x150, intensities scaled to [0, 1].

use base64::Engine;
use image::imageops::FilterType;

use super::DiagnosisError;

/// Classifier input edge length.
pub const TARGET_SIZE: u32 = 150;

/// Reject inputs larger than this before decoding. Guards against OOM on
/// corrupt or adversarial uploads.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// An image as submitted by the caller.
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Raw encoded bytes (PNG or JPEG).
    Bytes(Vec<u8>),
    /// A `data:image/...;base64,` URL as produced by browser uploads.
    DataUrl(String),
}

/// A normalized grayscale tensor ready for a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    /// Row-major intensities in [0, 1].
    pub pixels: Vec<f32>,
}

/// Decode and normalize one image into the classifier tensor shape.
pub fn normalize(input: &ImageInput) -> Result<ImageTensor, DiagnosisError> {
    let bytes = match input {
        ImageInput::Bytes(b) => b.clone(),
        ImageInput::DataUrl(url) => decode_data_url(url)?,
    };

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(DiagnosisError::Preprocessing(format!(
            "image too large: {} bytes",
            bytes.len()
        )));
    }

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| DiagnosisError::Preprocessing(format!("decode failed: {e}")))?;

    let gray = decoded.to_luma8();
    let resized = image::imageops::resize(&gray, TARGET_SIZE, TARGET_SIZE, FilterType::Triangle);

    let pixels = resized
        .as_raw()
        .iter()
        .map(|&v| f32::from(v) / 255.0)
        .collect();

    Ok(ImageTensor {
        width: TARGET_SIZE,
        height: TARGET_SIZE,
        pixels,
    })
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, DiagnosisError> {
    if !url.starts_with("data:image") {
        return Err(DiagnosisError::Preprocessing(
            "not an image data URL".into(),
        ));
    }
    let payload = url
        .split_once(',')
        .map(|(_, data)| data)
        .ok_or_else(|| DiagnosisError::Preprocessing("malformed data URL".into()))?;

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| DiagnosisError::Preprocessing(format!("base64 decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = GrayImage::from_pixel(width, height, Luma([value]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn normalizes_to_target_shape() {
        let tensor = normalize(&ImageInput::Bytes(png_bytes(300, 200, 255))).unwrap();
        assert_eq!(tensor.width, TARGET_SIZE);
        assert_eq!(tensor.height, TARGET_SIZE);
        assert_eq!(tensor.pixels.len(), (TARGET_SIZE * TARGET_SIZE) as usize);
        assert!(tensor.pixels.iter().all(|&p| (p - 1.0).abs() < 1e-6));
    }

    #[test]
    fn scales_intensities_into_unit_range() {
        let tensor = normalize(&ImageInput::Bytes(png_bytes(150, 150, 51))).unwrap();
        assert!(tensor.pixels.iter().all(|&p| (p - 0.2).abs() < 1e-2));
    }

    #[test]
    fn accepts_data_urls() {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(png_bytes(150, 150, 0));
        let url = format!("data:image/png;base64,{encoded}");
        let tensor = normalize(&ImageInput::DataUrl(url)).unwrap();
        assert_eq!(tensor.pixels.len(), (TARGET_SIZE * TARGET_SIZE) as usize);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result = normalize(&ImageInput::Bytes(vec![0xde, 0xad, 0xbe, 0xef]));
        assert!(matches!(result, Err(DiagnosisError::Preprocessing(_))));
    }

    #[test]
    fn rejects_non_image_data_url() {
        let result = normalize(&ImageInput::DataUrl("data:text/plain;base64,aGk=".into()));
        assert!(matches!(result, Err(DiagnosisError::Preprocessing(_))));
    }
}
