use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::fusion::SensorFusionState;
use super::loop_worker::orientation_loop;
use super::orientation::{GyroSample, HeadingIntegrator};

const FEED_CAPACITY: usize = 256;

/// Owns the background task that turns raw gyroscope samples into headings.
pub struct SensingController {
    fusion: SensorFusionState,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new(fusion: SensorFusionState) -> Self {
        Self {
            fusion,
            handle: None,
            cancel_token: None,
        }
    }

    /// Starts the orientation worker and returns the sender that the
    /// platform gyroscope callback should feed.
    pub fn start_sensing(&mut self, integrator: HeadingIntegrator) -> Result<mpsc::Sender<GyroSample>> {
        if self.handle.is_some() {
            bail!("sensing already active");
        }

        let cancel_token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);

        let handle = tokio::spawn(orientation_loop(
            rx,
            integrator,
            self.fusion.clone(),
            cancel_token.clone(),
        ));

        info!("orientation sensing started");
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(tx)
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("orientation loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn gyro_feed_updates_orientation_cell() {
        let fusion = SensorFusionState::new();
        let mut controller = SensingController::new(fusion.clone());
        let mut updates = fusion.subscribe();

        let tx = controller.start_sensing(HeadingIntegrator::default()).unwrap();
        assert!(controller.start_sensing(HeadingIntegrator::default()).is_err());

        let start = Utc::now();
        for i in 0..=10 {
            tx.send(GyroSample {
                observed_at: start + Duration::milliseconds(i * 100),
                angular_rate: [0.0, 0.0, -0.5],
                accel: Some([0.0, 0.0, 9.81]),
            })
            .await
            .unwrap();
        }

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                updates.changed().await.unwrap();
                let heading = updates.borrow().orientation.map(|o| o.heading_degrees);
                if let Some(h) = heading {
                    if h > 28.0 {
                        break;
                    }
                }
            }
        })
        .await
        .expect("heading never reached a full second of rotation");

        controller.stop_sensing().await.unwrap();
        assert!(!controller.is_active());
    }
}
