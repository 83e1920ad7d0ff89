use log::info;

/// Fires the camera once a verification passes. Must not block.
pub trait CaptureTrigger: Send + Sync {
    fn trigger(&self);
}

/// Trigger for headless hosts: records the authorization in the log.
pub struct LoggingTrigger;

impl CaptureTrigger for LoggingTrigger {
    fn trigger(&self) {
        info!("capture authorized; camera trigger fired");
    }
}
