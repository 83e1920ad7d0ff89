pub mod gate;
pub mod types;

pub use gate::{bearing_degrees, distance_meters, evaluate, heading_deviation, GateThresholds};
pub use types::{GeoFix, OrientationSample, TargetPoint, VerdictReason, VerificationVerdict};
