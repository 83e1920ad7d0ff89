use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// Location or motion permission is missing. Nothing was evaluated.
    #[error("location or motion permission has not been granted")]
    PermissionDenied,

    /// A newer verification request replaced this one before it was evaluated.
    #[error("verification superseded by a newer request")]
    Superseded,
}
