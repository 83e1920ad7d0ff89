//! Perceptual-hash feature model.
//!
//! A small model that runs without a neural runtime: the image is hashed
//! with `image_hasher` and every hash bit becomes a `+1.0` / `-1.0`
//! component, so cosine similarity tracks Hamming distance.

use std::{fs, path::Path, sync::Arc};

use image::{DynamicImage, RgbImage};
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use serde::{Deserialize, Serialize};

use super::{
    preprocess::DEFAULT_INPUT_SIDE, FeatureModel, ModelHandle, ModelInput, ModelRuntime,
    VisionError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HashAlgorithm {
    Mean,
    Gradient,
    VertGradient,
    DoubleGradient,
    Blockhash,
}

impl From<HashAlgorithm> for HashAlg {
    fn from(value: HashAlgorithm) -> Self {
        match value {
            HashAlgorithm::Mean => HashAlg::Mean,
            HashAlgorithm::Gradient => HashAlg::Gradient,
            HashAlgorithm::VertGradient => HashAlg::VertGradient,
            HashAlgorithm::DoubleGradient => HashAlg::DoubleGradient,
            HashAlgorithm::Blockhash => HashAlg::Blockhash,
        }
    }
}

fn default_input_side() -> u32 {
    DEFAULT_INPUT_SIDE
}

/// JSON model asset, e.g.
/// `{"algorithm": "doubleGradient", "hashWidth": 16, "hashHeight": 16}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HashModelDescriptor {
    pub algorithm: HashAlgorithm,
    pub hash_width: u32,
    pub hash_height: u32,
    #[serde(default = "default_input_side")]
    pub input_side: u32,
}

pub struct PerceptualHashRuntime;

impl ModelRuntime for PerceptualHashRuntime {
    fn load(&self, asset: &Path) -> Result<ModelHandle, VisionError> {
        let contents = fs::read_to_string(asset).map_err(|err| {
            VisionError::ModelUnavailable(format!("cannot read {}: {err}", asset.display()))
        })?;
        let descriptor: HashModelDescriptor = serde_json::from_str(&contents).map_err(|err| {
            VisionError::ModelUnavailable(format!("malformed model {}: {err}", asset.display()))
        })?;

        let model = PerceptualHashModel::new(descriptor)?;
        Ok(ModelHandle::new(asset.display().to_string(), Arc::new(model)))
    }
}

pub struct PerceptualHashModel {
    descriptor: HashModelDescriptor,
    output_dim: usize,
}

impl PerceptualHashModel {
    pub fn new(descriptor: HashModelDescriptor) -> Result<Self, VisionError> {
        if descriptor.hash_width == 0 || descriptor.hash_height == 0 || descriptor.input_side == 0 {
            return Err(VisionError::ModelUnavailable(format!(
                "hash model dimensions must be non-zero: {descriptor:?}"
            )));
        }

        // The bit count depends on the algorithm; measure it once.
        let probe = DynamicImage::ImageRgb8(RgbImage::new(descriptor.input_side, descriptor.input_side));
        let output_dim = hash_image(&descriptor, &probe).as_bytes().len() * 8;

        Ok(Self {
            descriptor,
            output_dim,
        })
    }
}

impl FeatureModel for PerceptualHashModel {
    fn input_side(&self) -> u32 {
        self.descriptor.input_side
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn infer(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError> {
        let image = DynamicImage::ImageRgb8(input.to_rgb_image());
        let hash = hash_image(&self.descriptor, &image);

        let mut values = Vec::with_capacity(self.output_dim);
        for byte in hash.as_bytes() {
            for bit in (0..8).rev() {
                values.push(if byte & (1 << bit) != 0 { 1.0 } else { -1.0 });
            }
        }
        Ok(values)
    }
}

fn hash_image(descriptor: &HashModelDescriptor, image: &DynamicImage) -> ImageHash {
    let hasher = HasherConfig::new()
        .hash_alg(descriptor.algorithm.into())
        .hash_size(descriptor.hash_width, descriptor.hash_height)
        .to_hasher();
    hasher.hash_image(image)
}
