//! Caller-side image preparation.
//!
//! Models expect a square RGB tensor in CHW order, normalized with the
//! ImageNet channel statistics. Resizing happens here, before extraction;
//! the extractor only checks that the shape matches.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};

use super::VisionError;

pub const DEFAULT_INPUT_SIDE: u32 = 224;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalized `3 x side x side` tensor, channel-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    side: u32,
    data: Vec<f32>,
}

impl ModelInput {
    pub fn from_image(image: &DynamicImage, side: u32) -> Self {
        let resized = image.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let plane = (side as usize) * (side as usize);
        let mut data = vec![0.0f32; 3 * plane];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let idx = (y as usize) * (side as usize) + x as usize;
            for c in 0..3 {
                data[c * plane + idx] = (f32::from(pixel[c]) / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        Self { side, data }
    }

    pub fn decode(bytes: &[u8], side: u32) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("failed to decode image bytes")?;
        Ok(Self::from_image(&image, side))
    }

    pub fn open(path: &Path, side: u32) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("failed to open image {}", path.display()))?;
        Ok(Self::from_image(&image, side))
    }

    /// Wraps a tensor produced by some other preprocessing path.
    pub fn from_tensor(side: u32, data: Vec<f32>) -> Result<Self, VisionError> {
        let expected = 3 * (side as usize) * (side as usize);
        if data.len() != expected {
            return Err(VisionError::InvalidInput(format!(
                "tensor has {} values, expected {expected} for side {side}",
                data.len()
            )));
        }
        Ok(Self { side, data })
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Undoes the normalization, for models that work on pixels.
    pub fn to_rgb_image(&self) -> RgbImage {
        let side = self.side as usize;
        let plane = side * side;
        RgbImage::from_fn(self.side, self.side, |x, y| {
            let idx = (y as usize) * side + x as usize;
            let mut channels = [0u8; 3];
            for (c, out) in channels.iter_mut().enumerate() {
                let value = self.data[c * plane + idx] * IMAGENET_STD[c] + IMAGENET_MEAN[c];
                *out = (value * 255.0).round().clamp(0.0, 255.0) as u8;
            }
            Rgb(channels)
        })
    }
}
