//! Location, orientation and verdict types shared by the sensing layer,
//! the gate and the capture controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single position fix from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub observed_at: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            observed_at,
        }
    }
}

/// Device heading in the world frame, degrees clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrientationSample {
    pub heading_degrees: f32,
    pub observed_at: DateTime<Utc>,
}

impl OrientationSample {
    /// Builds a sample with the heading wrapped into `[0, 360)`.
    pub fn new(heading_degrees: f32, observed_at: DateTime<Utc>) -> Self {
        Self {
            heading_degrees: normalize_degrees_f32(heading_degrees),
            observed_at,
        }
    }
}

/// The location a user has to reach. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl TargetPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Default for TargetPoint {
    fn default() -> Self {
        // Electrical and computer engineering building entrance.
        Self::new(25.15074259114326, 121.78002178454129)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerdictReason {
    NoFix,
    TooFar,
    WrongHeading,
    Ok,
}

impl VerdictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictReason::NoFix => "NoFix",
            VerdictReason::TooFar => "TooFar",
            VerdictReason::WrongHeading => "WrongHeading",
            VerdictReason::Ok => "Ok",
        }
    }
}

/// Outcome of one gate evaluation.
///
/// Values the gate did not get to compute for the given reason are left at
/// `0.0` (for example bearing and deviation on `TooFar`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationVerdict {
    pub distance_meters: f64,
    pub bearing_to_target_degrees: f64,
    pub heading_deviation_degrees: f64,
    pub passed: bool,
    pub reason: VerdictReason,
}

impl VerificationVerdict {
    pub(crate) fn no_fix() -> Self {
        Self {
            distance_meters: 0.0,
            bearing_to_target_degrees: 0.0,
            heading_deviation_degrees: 0.0,
            passed: false,
            reason: VerdictReason::NoFix,
        }
    }
}

pub(crate) fn normalize_degrees(value: f64) -> f64 {
    let wrapped = value.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

fn normalize_degrees_f32(value: f32) -> f32 {
    let wrapped = value.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
