use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VisionError {
    /// The model could not be loaded, was released, or produced malformed
    /// output. Extraction cannot proceed with this handle.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input does not match the model's expected shape.
    #[error("invalid model input: {0}")]
    InvalidInput(String),
}
