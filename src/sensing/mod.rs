pub mod controller;
pub mod fusion;
pub mod loop_worker;
pub mod orientation;
pub mod source;

pub use controller::SensingController;
pub use fusion::{SensorFusionState, SensorSnapshot};
pub use orientation::{GyroSample, HeadingConfig, HeadingIntegrator};
pub use source::{SensorSource, StaticSensorSource};
