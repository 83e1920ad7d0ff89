//! Heading from gyroscope integration.
//!
//! The yaw rate is the angular velocity projected onto the gravity
//! direction, so the result does not depend on how the phone is held.
//! Gravity is tracked with a low-pass filter over accelerometer readings.

use chrono::{DateTime, Utc};

use crate::geo::OrientationSample;

/// One raw reading from the motion sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroSample {
    pub observed_at: DateTime<Utc>,
    /// Angular rate `[x, y, z]` in rad/s, device frame.
    pub angular_rate: [f32; 3],
    /// Accelerometer `[x, y, z]` in m/s², when the platform delivers it.
    pub accel: Option<[f32; 3]>,
}

#[derive(Debug, Clone)]
pub struct HeadingConfig {
    /// Weight of each new accelerometer reading in the gravity estimate.
    pub gravity_alpha: f32,
    /// Step used for the first sample, when no previous timestamp exists.
    pub first_step_secs: f32,
    /// Gaps longer than this are not integrated (sensor stalled).
    pub max_step_secs: f32,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            gravity_alpha: 0.02,
            first_step_secs: 0.0,
            max_step_secs: 1.0,
        }
    }
}

pub struct HeadingIntegrator {
    config: HeadingConfig,
    heading_deg: f32,
    gravity: [f32; 3],
    last_observed: Option<DateTime<Utc>>,
}

impl HeadingIntegrator {
    pub fn new(config: HeadingConfig) -> Self {
        Self {
            config,
            heading_deg: 0.0,
            gravity: [0.0, 0.0, 9.81],
            last_observed: None,
        }
    }

    /// Anchor the integration to an absolute heading (e.g. a compass reading).
    pub fn set_heading(&mut self, heading_deg: f32) {
        self.heading_deg = heading_deg.rem_euclid(360.0);
    }

    pub fn heading(&self) -> f32 {
        self.heading_deg
    }

    pub fn process(&mut self, sample: &GyroSample) -> OrientationSample {
        let dt = match self.last_observed {
            Some(previous) => {
                let secs = (sample.observed_at - previous).num_microseconds().unwrap_or(0) as f32
                    / 1_000_000.0;
                if secs <= 0.0 || secs > self.config.max_step_secs {
                    0.0
                } else {
                    secs
                }
            }
            None => self.config.first_step_secs,
        };
        self.last_observed = Some(sample.observed_at);

        if let Some(accel) = sample.accel {
            self.update_gravity(accel);
        }

        let yaw_rate = self.yaw_rate(sample.angular_rate);
        // Counter-clockwise rotation about the up axis lowers the compass heading.
        self.heading_deg = (self.heading_deg - yaw_rate.to_degrees() * dt).rem_euclid(360.0);

        OrientationSample::new(self.heading_deg, sample.observed_at)
    }

    fn update_gravity(&mut self, accel: [f32; 3]) {
        let alpha = self.config.gravity_alpha;
        for (g, a) in self.gravity.iter_mut().zip(accel) {
            *g = alpha * a + (1.0 - alpha) * *g;
        }
    }

    fn yaw_rate(&self, rate: [f32; 3]) -> f32 {
        let [gx, gy, gz] = self.gravity;
        let norm = (gx * gx + gy * gy + gz * gz).sqrt();
        if norm < 0.1 {
            return 0.0;
        }
        (rate[0] * gx + rate[1] * gy + rate[2] * gz) / norm
    }
}

impl Default for HeadingIntegrator {
    fn default() -> Self {
        Self::new(HeadingConfig::default())
    }
}
