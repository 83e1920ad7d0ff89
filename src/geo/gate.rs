//! Geofence and bearing gate.
//!
//! Pure functions only: given the current fix, the current heading and a
//! target point, decide whether the user is close enough and facing the
//! target. Nothing here blocks or touches I/O, so it is safe to call from
//! any task.

use serde::{Deserialize, Serialize};

use super::types::{
    normalize_degrees, GeoFix, OrientationSample, TargetPoint, VerdictReason,
    VerificationVerdict,
};

/// Mean Earth radius (IUGG), meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Tunable limits for [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateThresholds {
    /// A fix farther than this fails. Equal distance passes.
    pub max_distance_meters: f64,
    /// A heading deviation above this fails. Equal deviation passes.
    pub max_heading_deviation_degrees: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            max_distance_meters: 20.0,
            max_heading_deviation_degrees: 45.0,
        }
    }
}

impl GateThresholds {
    pub fn evaluate(
        &self,
        fix: Option<&GeoFix>,
        orientation: Option<&OrientationSample>,
        target: &TargetPoint,
    ) -> VerificationVerdict {
        evaluate(
            fix,
            orientation,
            target,
            self.max_distance_meters,
            self.max_heading_deviation_degrees,
        )
    }
}

/// Evaluate the gate for one snapshot of sensor state.
///
/// A missing or non-finite orientation sample is treated as the worst
/// possible deviation (180°), so it fails unless the allowed deviation is at
/// least 180°. A fix with non-finite coordinates counts as no fix at all.
/// Comparisons are written so that a NaN anywhere fails the gate.
pub fn evaluate(
    fix: Option<&GeoFix>,
    orientation: Option<&OrientationSample>,
    target: &TargetPoint,
    max_distance_meters: f64,
    max_heading_deviation_degrees: f64,
) -> VerificationVerdict {
    let Some(fix) = fix.filter(|fix| fix.latitude.is_finite() && fix.longitude.is_finite()) else {
        return VerificationVerdict::no_fix();
    };

    let distance = distance_meters(fix.latitude, fix.longitude, target.latitude, target.longitude);
    if !(distance <= max_distance_meters) {
        return VerificationVerdict {
            distance_meters: distance,
            bearing_to_target_degrees: 0.0,
            heading_deviation_degrees: 0.0,
            passed: false,
            reason: VerdictReason::TooFar,
        };
    }

    let bearing = bearing_degrees(fix.latitude, fix.longitude, target.latitude, target.longitude);
    let deviation = orientation
        .map(|sample| f64::from(sample.heading_degrees))
        .filter(|heading| heading.is_finite())
        .map(|heading| heading_deviation(heading, bearing))
        .unwrap_or(180.0);

    let (passed, reason) = if !(deviation <= max_heading_deviation_degrees) {
        (false, VerdictReason::WrongHeading)
    } else {
        (true, VerdictReason::Ok)
    };

    VerificationVerdict {
        distance_meters: distance,
        bearing_to_target_degrees: bearing,
        heading_deviation_degrees: deviation,
        passed,
        reason,
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Clamp guards asin against a > 1 from rounding at antipodes.
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}

/// Initial bearing (forward azimuth) from point 1 to point 2, in `[0, 360)`.
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let x = d_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    normalize_degrees(x.atan2(y).to_degrees())
}

/// Smallest absolute angle between two headings, in `[0, 180]`.
pub fn heading_deviation(heading: f64, bearing: f64) -> f64 {
    let diff = (heading - bearing).abs().rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}
