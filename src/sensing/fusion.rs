use std::sync::Arc;

use tokio::sync::watch;

use crate::geo::{GeoFix, OrientationSample};

/// Both latest-value cells, read together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorSnapshot {
    pub fix: Option<GeoFix>,
    pub orientation: Option<OrientationSample>,
}

/// Latest location fix and latest heading, each overwritten by its own source.
///
/// Both cells sit behind one `watch` channel: writers touch only their own
/// field through `send_modify`, and readers clone the pair under a single
/// borrow, so a snapshot never mixes a torn update.
#[derive(Clone)]
pub struct SensorFusionState {
    tx: Arc<watch::Sender<SensorSnapshot>>,
}

impl SensorFusionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SensorSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn publish_fix(&self, fix: GeoFix) {
        self.tx.send_modify(|snapshot| snapshot.fix = Some(fix));
    }

    pub fn publish_orientation(&self, sample: OrientationSample) {
        self.tx.send_modify(|snapshot| snapshot.orientation = Some(sample));
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        *self.tx.borrow()
    }

    /// Receiver that wakes on every update to either cell.
    pub fn subscribe(&self) -> watch::Receiver<SensorSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for SensorFusionState {
    fn default() -> Self {
        Self::new()
    }
}
