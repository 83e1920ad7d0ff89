use anyhow::Result;
use chrono::Utc;

use crate::geo::{GeoFix, OrientationSample};

use super::fusion::SensorFusionState;

/// Platform side of the location and orientation providers.
///
/// Implementations push readings into a [`SensorFusionState`] at their own
/// cadence; the capture flow only asks them to start and then reads the
/// latest values.
pub trait SensorSource: Send + Sync {
    /// Whether location and motion permissions are granted.
    fn has_permission(&self) -> bool;

    /// Ask the providers to start (or keep) delivering updates.
    fn request_updates(&self) -> Result<()>;
}

/// Source that republishes one known position and heading on every request.
///
/// Useful on hosts without a GNSS receiver, and for replaying a recorded fix.
pub struct StaticSensorSource {
    fusion: SensorFusionState,
    latitude: f64,
    longitude: f64,
    heading_degrees: Option<f32>,
}

impl StaticSensorSource {
    pub fn new(
        fusion: SensorFusionState,
        latitude: f64,
        longitude: f64,
        heading_degrees: Option<f32>,
    ) -> Self {
        Self {
            fusion,
            latitude,
            longitude,
            heading_degrees,
        }
    }
}

impl SensorSource for StaticSensorSource {
    fn has_permission(&self) -> bool {
        true
    }

    fn request_updates(&self) -> Result<()> {
        let now = Utc::now();
        self.fusion
            .publish_fix(GeoFix::new(self.latitude, self.longitude, now));
        if let Some(heading) = self.heading_degrees {
            self.fusion
                .publish_orientation(OrientationSample::new(heading, now));
        }
        Ok(())
    }
}
