use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::fusion::SensorFusionState;
use super::orientation::{GyroSample, HeadingIntegrator};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Warn when no motion sample arrives for this long.
const STALL_WARN_SECS: u64 = 5;

/// Drains raw gyroscope samples, integrates them into a heading, and keeps
/// the orientation cell of `fusion` current.
pub async fn orientation_loop(
    mut samples: mpsc::Receiver<GyroSample>,
    mut integrator: HeadingIntegrator,
    fusion: SensorFusionState,
    cancel_token: CancellationToken,
) {
    let mut last_sample = Instant::now();
    let mut processed: u64 = 0;
    let mut stall_check = tokio::time::interval(Duration::from_secs(STALL_WARN_SECS));

    loop {
        tokio::select! {
            maybe_sample = samples.recv() => {
                let Some(sample) = maybe_sample else {
                    log_info!("gyroscope feed closed after {} samples", processed);
                    break;
                };
                let orientation = integrator.process(&sample);
                fusion.publish_orientation(orientation);
                last_sample = Instant::now();
                processed += 1;
            }
            _ = stall_check.tick() => {
                if processed > 0 && last_sample.elapsed() >= Duration::from_secs(STALL_WARN_SECS) {
                    log_warn!(
                        "no gyroscope sample for {}ms; heading is going stale",
                        last_sample.elapsed().as_millis()
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("orientation loop shutting down");
                break;
            }
        }
    }
}
