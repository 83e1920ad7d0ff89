use std::{path::Path, sync::Arc};

use super::{FeatureVector, ModelInput, VisionError};

/// An opaque image → embedding function.
pub trait FeatureModel: Send + Sync {
    /// Square input resolution the model was built for.
    fn input_side(&self) -> u32;

    /// Length of every vector the model produces.
    fn output_dim(&self) -> usize;

    fn infer(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError>;
}

/// Loads model assets into handles.
pub trait ModelRuntime {
    fn load(&self, asset: &Path) -> Result<ModelHandle, VisionError>;
}

/// Explicitly owned, loaded model. Load once, extract many times, then
/// [`release`](ModelHandle::release).
#[derive(Clone)]
pub struct ModelHandle {
    name: String,
    model: Option<Arc<dyn FeatureModel>>,
}

impl ModelHandle {
    pub fn new(name: impl Into<String>, model: Arc<dyn FeatureModel>) -> Self {
        Self {
            name: name.into(),
            model: Some(model),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn input_side(&self) -> Option<u32> {
        self.model.as_ref().map(|model| model.input_side())
    }

    pub fn output_dim(&self) -> Option<usize> {
        self.model.as_ref().map(|model| model.output_dim())
    }

    pub fn release(&mut self) {
        self.model = None;
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Run the model behind `handle` on one prepared input.
///
/// `input` must already be resized to the model's input side (see
/// [`ModelInput::from_image`]). The returned vector always has the handle's
/// output dimension; a model that breaks that contract is reported as
/// unavailable rather than producing a partial vector.
pub fn extract(handle: &ModelHandle, input: &ModelInput) -> Result<FeatureVector, VisionError> {
    let model = handle.model.as_ref().ok_or_else(|| {
        VisionError::ModelUnavailable(format!("model '{}' has been released", handle.name))
    })?;

    if input.side() != model.input_side() {
        return Err(VisionError::InvalidInput(format!(
            "input side {} does not match model side {}",
            input.side(),
            model.input_side()
        )));
    }

    let output = model.infer(input)?;
    let expected = model.output_dim();
    if output.len() != expected {
        return Err(VisionError::ModelUnavailable(format!(
            "model '{}' returned {} values, expected {expected}",
            handle.name,
            output.len()
        )));
    }
    if output.iter().any(|value| !value.is_finite()) {
        return Err(VisionError::ModelUnavailable(format!(
            "model '{}' returned non-finite values",
            handle.name
        )));
    }

    Ok(FeatureVector::new(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Averages each channel; optionally lies about its output size.
    struct ChannelMeans {
        side: u32,
        claimed_dim: usize,
    }

    impl FeatureModel for ChannelMeans {
        fn input_side(&self) -> u32 {
            self.side
        }

        fn output_dim(&self) -> usize {
            self.claimed_dim
        }

        fn infer(&self, input: &ModelInput) -> Result<Vec<f32>, VisionError> {
            let plane = (self.side * self.side) as usize;
            Ok(input
                .data()
                .chunks(plane)
                .map(|chunk| chunk.iter().sum::<f32>() / plane as f32)
                .collect())
        }
    }

    fn handle(claimed_dim: usize) -> ModelHandle {
        ModelHandle::new("means", Arc::new(ChannelMeans { side: 2, claimed_dim }))
    }

    fn input(side: u32) -> ModelInput {
        let plane = (side * side) as usize;
        let mut data = vec![1.0; plane];
        data.extend(vec![2.0; plane]);
        data.extend(vec![3.0; plane]);
        ModelInput::from_tensor(side, data).unwrap()
    }

    #[test]
    fn extracts_fixed_length_vectors() {
        let handle = handle(3);
        let first = extract(&handle, &input(2)).unwrap();
        let second = extract(&handle, &input(2)).unwrap();
        assert_eq!(first.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(first.len(), second.len());
        assert_eq!(handle.output_dim(), Some(3));
    }

    #[test]
    fn released_handle_is_unavailable() {
        let mut handle = handle(3);
        handle.release();
        assert!(!handle.is_loaded());
        assert!(matches!(
            extract(&handle, &input(2)),
            Err(VisionError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn wrong_resolution_is_rejected() {
        assert!(matches!(
            extract(&handle(3), &input(3)),
            Err(VisionError::InvalidInput(_))
        ));
    }

    #[test]
    fn malformed_output_is_never_returned() {
        assert!(matches!(
            extract(&handle(4), &input(2)),
            Err(VisionError::ModelUnavailable(_))
        ));
    }
}
