pub mod error;
pub mod model;
pub mod phash;
pub mod preprocess;
pub mod vector;

pub use error::VisionError;
pub use model::{extract, FeatureModel, ModelHandle, ModelRuntime};
pub use phash::{HashAlgorithm, HashModelDescriptor, PerceptualHashRuntime};
pub use preprocess::{ModelInput, DEFAULT_INPUT_SIDE};
pub use vector::FeatureVector;
