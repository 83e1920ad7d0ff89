use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::VerificationVerdict;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    #[default]
    Idle,
    AwaitingFix,
    Evaluating,
    Authorized,
    Denied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SettleStrategy {
    /// Always wait the full settle time before evaluating.
    #[default]
    FixedDelay,
    /// Evaluate as soon as a fix newer than the request arrives, or at the
    /// settle deadline, whichever comes first.
    FirstUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub status: CaptureStatus,
    pub request_id: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    /// Verdict of the most recent completed evaluation.
    pub last_verdict: Option<VerificationVerdict>,
    /// Bumped on every request; an evaluation only lands if its generation
    /// is still current.
    #[serde(skip)]
    pub generation: u64,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, invalidating whatever was in flight.
    pub fn begin_request(&mut self, request_id: String, requested_at: DateTime<Utc>) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.status = CaptureStatus::AwaitingFix;
        self.request_id = Some(request_id);
        self.requested_at = Some(requested_at);
        self.generation
    }

    /// Moves to `Evaluating` if `generation` is still the live request.
    pub fn enter_evaluating(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.status != CaptureStatus::AwaitingFix {
            return false;
        }
        self.status = CaptureStatus::Evaluating;
        true
    }

    pub fn record_verdict(&mut self, verdict: VerificationVerdict) -> CaptureStatus {
        self.last_verdict = Some(verdict);
        self.status = if verdict.passed {
            CaptureStatus::Authorized
        } else {
            CaptureStatus::Denied
        };
        self.status
    }

    /// Back to `Idle`, keeping the last verdict for display.
    pub fn finish(&mut self) {
        self.status = CaptureStatus::Idle;
        self.request_id = None;
        self.requested_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::VerdictReason;

    fn verdict(passed: bool) -> VerificationVerdict {
        VerificationVerdict {
            distance_meters: 3.0,
            bearing_to_target_degrees: 10.0,
            heading_deviation_degrees: 2.0,
            passed,
            reason: if passed {
                VerdictReason::Ok
            } else {
                VerdictReason::WrongHeading
            },
        }
    }

    #[test]
    fn stale_generation_cannot_evaluate() {
        let mut state = CaptureState::new();
        let first = state.begin_request("a".into(), Utc::now());
        let second = state.begin_request("b".into(), Utc::now());

        assert!(!state.enter_evaluating(first));
        assert!(state.enter_evaluating(second));
        assert_eq!(state.status, CaptureStatus::Evaluating);
        assert!(!state.enter_evaluating(second));
    }

    #[test]
    fn verdict_selects_terminal_status() {
        let mut state = CaptureState::new();
        let generation = state.begin_request("a".into(), Utc::now());
        state.enter_evaluating(generation);
        assert_eq!(state.record_verdict(verdict(true)), CaptureStatus::Authorized);
        assert_eq!(state.record_verdict(verdict(false)), CaptureStatus::Denied);

        state.finish();
        assert_eq!(state.status, CaptureStatus::Idle);
        assert!(state.last_verdict.is_some());
        assert!(state.request_id.is_none());
    }
}
