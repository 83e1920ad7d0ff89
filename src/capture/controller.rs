use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    geo::{GateThresholds, TargetPoint, VerificationVerdict},
    sensing::{SensorFusionState, SensorSnapshot, SensorSource},
};

use super::{CaptureError, CaptureState, CaptureStatus, CaptureTrigger, SettleStrategy};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub target: TargetPoint,
    pub thresholds: GateThresholds,
    pub settle_ms: u64,
    pub settle_strategy: SettleStrategy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target: TargetPoint::default(),
            thresholds: GateThresholds::default(),
            settle_ms: 2000,
            settle_strategy: SettleStrategy::FixedDelay,
        }
    }
}

impl CaptureConfig {
    fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Runs one verification at a time: wake the sensors, let them settle,
/// evaluate the gate and fire the camera on a pass.
#[derive(Clone)]
pub struct CaptureAuthority {
    state: Arc<Mutex<CaptureState>>,
    inflight: Arc<Mutex<Option<(u64, CancellationToken)>>>,
    events: Arc<watch::Sender<CaptureState>>,
    fusion: SensorFusionState,
    source: Arc<dyn SensorSource>,
    trigger: Arc<dyn CaptureTrigger>,
    config: CaptureConfig,
}

impl CaptureAuthority {
    pub fn new(
        fusion: SensorFusionState,
        source: Arc<dyn SensorSource>,
        trigger: Arc<dyn CaptureTrigger>,
        config: CaptureConfig,
    ) -> Self {
        let (events, _rx) = watch::channel(CaptureState::new());
        Self {
            state: Arc::new(Mutex::new(CaptureState::new())),
            inflight: Arc::new(Mutex::new(None)),
            events: Arc::new(events),
            fusion,
            source,
            trigger,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub async fn get_state(&self) -> CaptureState {
        self.state.lock().await.clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.events.subscribe()
    }

    /// Verify the user's position and heading, and fire the capture trigger
    /// on a pass.
    ///
    /// Both passing and failing verdicts are returned as `Ok`; check
    /// `verdict.passed`. A request that is replaced by a newer one while it
    /// is still settling returns [`CaptureError::Superseded`].
    pub async fn request_verification(&self) -> Result<VerificationVerdict, CaptureError> {
        if !self.source.has_permission() {
            log_warn!("verification refused: sensor permission missing");
            return Err(CaptureError::PermissionDenied);
        }

        let request_id = Uuid::new_v4().to_string();
        let requested_at = Utc::now();
        let cancel_token = CancellationToken::new();

        let generation = {
            let mut inflight = self.inflight.lock().await;
            let mut state = self.state.lock().await;
            let generation = state.begin_request(request_id.clone(), requested_at);
            if let Some((previous, token)) = inflight.replace((generation, cancel_token.clone())) {
                log_info!("verification {} superseded by {}", previous, generation);
                token.cancel();
            }
            self.events.send_replace(state.clone());
            generation
        };

        // Subscribe before waking the sources so no update is missed.
        let updates = self.fusion.subscribe();
        if let Err(err) = self.source.request_updates() {
            log_error!("sensor source failed to start for {}: {err:?}", request_id);
        }

        tokio::select! {
            _ = cancel_token.cancelled() => {
                return Err(CaptureError::Superseded);
            }
            _ = self.settle(updates, requested_at) => {}
        }

        let verdict = {
            let mut state = self.state.lock().await;
            if !state.enter_evaluating(generation) {
                return Err(CaptureError::Superseded);
            }
            self.events.send_replace(state.clone());

            let snapshot = self.fusion.snapshot();
            let verdict = self.config.thresholds.evaluate(
                snapshot.fix.as_ref(),
                snapshot.orientation.as_ref(),
                &self.config.target,
            );

            let status = state.record_verdict(verdict);
            self.events.send_replace(state.clone());
            log_info!(
                "verification {} -> {:?} ({}; distance={:.1}m deviation={:.1}°)",
                request_id,
                status,
                verdict.reason.as_str(),
                verdict.distance_meters,
                verdict.heading_deviation_degrees
            );

            if status == CaptureStatus::Authorized {
                self.trigger.trigger();
            }

            state.finish();
            self.events.send_replace(state.clone());
            verdict
        };

        let mut inflight = self.inflight.lock().await;
        if matches!(inflight.as_ref(), Some((current, _)) if *current == generation) {
            inflight.take();
        }

        Ok(verdict)
    }

    async fn settle(&self, mut updates: watch::Receiver<SensorSnapshot>, requested_at: DateTime<Utc>) {
        let deadline = tokio::time::sleep(self.config.settle());

        match self.config.settle_strategy {
            SettleStrategy::FixedDelay => deadline.await,
            SettleStrategy::FirstUpdate => {
                let fresh_fix = async {
                    loop {
                        let fresh = updates
                            .borrow_and_update()
                            .fix
                            .map(|fix| fix.observed_at >= requested_at)
                            .unwrap_or(false);
                        if fresh {
                            return;
                        }
                        if updates.changed().await.is_err() {
                            // Sender gone; only the deadline can end the wait.
                            std::future::pending::<()>().await;
                        }
                    }
                };

                tokio::select! {
                    _ = deadline => {}
                    _ = fresh_fix => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{gate::EARTH_RADIUS_METERS, VerdictReason};
    use crate::sensing::StaticSensorSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingTrigger {
        fired: AtomicUsize,
    }

    impl CaptureTrigger for CountingTrigger {
        fn trigger(&self) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoPermission;

    impl SensorSource for NoPermission {
        fn has_permission(&self) -> bool {
            false
        }

        fn request_updates(&self) -> anyhow::Result<()> {
            panic!("sources must not be started without permission");
        }
    }

    struct Silent;

    impl SensorSource for Silent {
        fn has_permission(&self) -> bool {
            true
        }

        fn request_updates(&self) -> anyhow::Result<()> {
            anyhow::bail!("provider disabled")
        }
    }

    const TARGET: TargetPoint = TargetPoint::new(25.15074, 121.78002);

    fn config(settle_ms: u64, settle_strategy: SettleStrategy) -> CaptureConfig {
        CaptureConfig {
            target: TARGET,
            thresholds: GateThresholds::default(),
            settle_ms,
            settle_strategy,
        }
    }

    /// Static source standing `meters` south of the target, facing `heading`.
    fn south_of_target(fusion: &SensorFusionState, meters: f64, heading: f32) -> Arc<dyn SensorSource> {
        let d_lat = (meters / EARTH_RADIUS_METERS).to_degrees();
        Arc::new(StaticSensorSource::new(
            fusion.clone(),
            TARGET.latitude - d_lat,
            TARGET.longitude,
            Some(heading),
        ))
    }

    fn build_authority(
        fusion: SensorFusionState,
        source: Arc<dyn SensorSource>,
        config: CaptureConfig,
    ) -> (CaptureAuthority, Arc<CountingTrigger>) {
        let trigger = Arc::new(CountingTrigger::default());
        let authority = CaptureAuthority::new(fusion, source, trigger.clone(), config);
        (authority, trigger)
    }

    #[tokio::test]
    async fn missing_permission_never_enters_state_machine() {
        let (authority, trigger) = build_authority(
            SensorFusionState::new(),
            Arc::new(NoPermission),
            config(10, SettleStrategy::FixedDelay),
        );
        let events = authority.subscribe();

        let result = authority.request_verification().await;
        assert_eq!(result, Err(CaptureError::PermissionDenied));
        assert_eq!(authority.get_state().await.status, CaptureStatus::Idle);
        assert!(!events.has_changed().unwrap());
        assert_eq!(trigger.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn passing_verdict_fires_trigger_and_returns_to_idle() {
        let fusion = SensorFusionState::new();
        let (authority, trigger) = build_authority(
            fusion.clone(),
            south_of_target(&fusion, 10.0, 0.0),
            config(20, SettleStrategy::FixedDelay),
        );

        let verdict = authority.request_verification().await.unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.reason, VerdictReason::Ok);
        assert!((verdict.distance_meters - 10.0).abs() < 0.01);
        assert_eq!(trigger.fired.load(Ordering::SeqCst), 1);

        let state = authority.get_state().await;
        assert_eq!(state.status, CaptureStatus::Idle);
        assert_eq!(state.last_verdict, Some(verdict));
    }

    #[tokio::test]
    async fn far_fix_is_denied_without_capture() {
        let fusion = SensorFusionState::new();
        let (authority, trigger) = build_authority(
            fusion.clone(),
            south_of_target(&fusion, 500.0, 0.0),
            config(20, SettleStrategy::FixedDelay),
        );

        let verdict = authority.request_verification().await.unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.reason, VerdictReason::TooFar);
        assert_eq!(trigger.fired.load(Ordering::SeqCst), 0);
        assert_eq!(authority.get_state().await.status, CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn failed_source_still_yields_no_fix_verdict() {
        let (authority, trigger) = build_authority(
            SensorFusionState::new(),
            Arc::new(Silent),
            config(20, SettleStrategy::FirstUpdate),
        );

        let verdict = authority.request_verification().await.unwrap();
        assert_eq!(verdict.reason, VerdictReason::NoFix);
        assert_eq!(trigger.fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn newer_request_supersedes_pending_one() {
        let fusion = SensorFusionState::new();
        let (authority, trigger) = build_authority(
            fusion.clone(),
            south_of_target(&fusion, 5.0, 0.0),
            config(300, SettleStrategy::FixedDelay),
        );

        let first = tokio::spawn({
            let authority = authority.clone();
            async move { authority.request_verification().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(authority.get_state().await.status, CaptureStatus::AwaitingFix);

        let second = authority.request_verification().await;
        let first = first.await.unwrap();

        assert_eq!(first, Err(CaptureError::Superseded));
        assert!(second.unwrap().passed);
        assert_eq!(trigger.fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_update_strategy_returns_before_deadline() {
        let fusion = SensorFusionState::new();
        let (authority, _trigger) = build_authority(
            fusion.clone(),
            south_of_target(&fusion, 5.0, 0.0),
            config(5_000, SettleStrategy::FirstUpdate),
        );

        let started = Instant::now();
        let verdict = tokio::time::timeout(Duration::from_secs(2), authority.request_verification())
            .await
            .expect("first-update settle waited for the full deadline")
            .unwrap();

        assert!(verdict.passed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn transitions_are_published() {
        let fusion = SensorFusionState::new();
        let (authority, _trigger) = build_authority(
            fusion.clone(),
            south_of_target(&fusion, 5.0, 90.0),
            config(100, SettleStrategy::FixedDelay),
        );
        let mut events = authority.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while events.changed().await.is_ok() {
                let status = events.borrow_and_update().status;
                seen.push(status);
                if status == CaptureStatus::Idle {
                    break;
                }
            }
            seen
        });

        let verdict = authority.request_verification().await.unwrap();
        assert_eq!(verdict.reason, VerdictReason::WrongHeading);

        let seen = observer.await.unwrap();
        assert_eq!(seen.first(), Some(&CaptureStatus::AwaitingFix));
        assert_eq!(seen.last(), Some(&CaptureStatus::Idle));
    }
}
