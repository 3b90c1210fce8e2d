//! Image Preprocessing
//!
//! base64 (optionally data-URI prefixed) → RGB pixel grid → `(1, H, W, 3)`
//! float tensor. Pure and deterministic; the only failure is an undecodable
//! image.
//!
//! Pixel range depends on the classifier family, see [`Normalization`].
//! Feeding a model the wrong range does not raise an error, it only degrades
//! accuracy, so the range is always taken from the crop's declared family.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::DetectionError;

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

// ============================================================================
// TYPES
// ============================================================================

/// Pixel value policy applied before the tensor reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Raw [0, 255] floats; the model graph rescales internally
    Raw,
    /// (x / 255 - mean) / std per channel
    ImageNet,
}

impl Normalization {
    pub fn describe(&self) -> &'static str {
        match self {
            Normalization::Raw => "raw 0-255 (rescaled inside model graph)",
            Normalization::ImageNet => "ImageNet mean/std (x/255 - mean) / std",
        }
    }

    #[inline]
    fn apply(&self, value: u8, channel: usize) -> f32 {
        match self {
            Normalization::Raw => value as f32,
            Normalization::ImageNet => {
                (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            }
        }
    }
}

/// Tensor memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

/// What one classifier family expects from preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessSpec {
    pub target_size: u32,
    pub normalization: Normalization,
}

/// Introspection payload for service info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessInfo {
    pub target_size: u32,
    pub normalization: String,
    pub layout: TensorLayout,
}

// ============================================================================
// DECODING
// ============================================================================

/// Drop a `data:image/...;base64,` header if present
pub fn strip_data_uri(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    match trimmed.split_once(',') {
        Some((_, payload)) => payload,
        None => trimmed,
    }
}

/// base64 → raw bytes
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, DetectionError> {
    let payload: String = strip_data_uri(encoded)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if payload.is_empty() {
        return Err(DetectionError::Decode("empty image payload".to_string()));
    }

    BASE64
        .decode(payload.as_bytes())
        .map_err(|e| DetectionError::Decode(format!("invalid base64: {}", e)))
}

/// base64 → RGB image, converting any other color mode
pub fn decode_image(encoded: &str) -> Result<RgbImage, DetectionError> {
    let bytes = decode_base64(encoded)?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| DetectionError::Decode(format!("not a valid image: {}", e)))?;

    Ok(match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    })
}

// ============================================================================
// PREPROCESSOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    spec: PreprocessSpec,
}

impl ImagePreprocessor {
    pub fn new(spec: PreprocessSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> PreprocessSpec {
        self.spec
    }

    /// Decode and convert in one step
    pub fn preprocess(&self, encoded: &str) -> Result<Array4<f32>, DetectionError> {
        let image = decode_image(encoded)?;
        Ok(self.to_tensor(&image))
    }

    /// RGB image → `(1, size, size, 3)` tensor
    pub fn to_tensor(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.spec.target_size;
        let resized;
        let source = if image.width() == size && image.height() == size {
            image
        } else {
            resized = image::imageops::resize(image, size, size, FilterType::Triangle);
            &resized
        };

        let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
        for (x, y, pixel) in source.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, y as usize, x as usize, channel]] =
                    self.spec.normalization.apply(pixel[channel], channel);
            }
        }
        tensor
    }

    pub fn describe(&self) -> PreprocessInfo {
        PreprocessInfo {
            target_size: self.spec.target_size,
            normalization: self.spec.normalization.describe().to_string(),
            layout: TensorLayout::Nhwc,
        }
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Solid-color PNG, base64 encoded
#[cfg(test)]
pub(crate) fn test_image_base64(width: u32, height: u32, rgb: [u8; 3]) -> String {
    let image = RgbImage::from_pixel(width, height, image::Rgb(rgb));
    encode_png(DynamicImage::ImageRgb8(image))
}

/// Left half one color, right half another
#[cfg(test)]
pub(crate) fn test_split_image_base64(size: u32, left: [u8; 3], right: [u8; 3]) -> String {
    let image = RgbImage::from_fn(size, size, |x, _| {
        if x < size / 2 {
            image::Rgb(left)
        } else {
            image::Rgb(right)
        }
    });
    encode_png(DynamicImage::ImageRgb8(image))
}

#[cfg(test)]
pub(crate) fn encode_png(image: DynamicImage) -> String {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("png encode");
    BASE64.encode(buffer.into_inner())
}
