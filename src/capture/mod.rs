pub mod controller;
pub mod error;
pub mod state;
pub mod trigger;

pub use controller::{CaptureAuthority, CaptureConfig};
pub use error::CaptureError;
pub use state::{CaptureState, CaptureStatus, SettleStrategy};
pub use trigger::{CaptureTrigger, LoggingTrigger};
