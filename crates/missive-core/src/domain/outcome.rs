//! Outcome model: the result value of one per-recipient step.
//!
//! The orchestrator's step is a total function
//! `(Recipient, n) -> AttemptOutcome`; adapter failures become values here
//! instead of escaping as errors.

use serde::{Deserialize, Serialize};

use super::classifier::OutcomeClassification;
use super::recipient::{DeliveryStatus, FailureReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    /// New status for the recipient (always terminal).
    pub status: DeliveryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,

    /// `None` when the channel was never contacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<OutcomeClassification>,

    /// Whether this step consumed a real send (and a pacing delay).
    pub dispatched: bool,
}

impl AttemptOutcome {
    pub fn classified(classification: OutcomeClassification) -> Self {
        let (status, reason) = match classification {
            OutcomeClassification::Success => (DeliveryStatus::Success, None),
            OutcomeClassification::Restricted => {
                (DeliveryStatus::Fail, Some(FailureReason::Restricted))
            }
            OutcomeClassification::RateLimited => {
                (DeliveryStatus::Fail, Some(FailureReason::RateLimited))
            }
            OutcomeClassification::Unknown => (DeliveryStatus::Fail, Some(FailureReason::Unknown)),
        };
        Self {
            status,
            reason,
            classification: Some(classification),
            dispatched: true,
        }
    }

    /// Blank identifier: fail without contacting the channel.
    pub fn blank_id() -> Self {
        Self {
            status: DeliveryStatus::Fail,
            reason: Some(FailureReason::BlankId),
            classification: None,
            dispatched: false,
        }
    }

    /// Adapter raised an error: same as an empty confirmation.
    pub fn adapter_error() -> Self {
        Self {
            reason: Some(FailureReason::AdapterError),
            ..Self::classified(OutcomeClassification::Unknown)
        }
    }

    pub fn session_lost() -> Self {
        Self {
            reason: Some(FailureReason::SessionLost),
            ..Self::classified(OutcomeClassification::Unknown)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_classification_succeeds() {
        assert!(AttemptOutcome::classified(OutcomeClassification::Success).is_success());
        for c in [
            OutcomeClassification::Restricted,
            OutcomeClassification::RateLimited,
            OutcomeClassification::Unknown,
        ] {
            let o = AttemptOutcome::classified(c);
            assert_eq!(o.status, DeliveryStatus::Fail);
            assert!(o.reason.is_some());
            assert!(o.dispatched);
        }
    }

    #[test]
    fn blank_id_is_not_dispatched() {
        let o = AttemptOutcome::blank_id();
        assert!(!o.dispatched);
        assert_eq!(o.classification, None);
        assert_eq!(o.reason, Some(FailureReason::BlankId));
    }

    #[test]
    fn adapter_error_maps_to_unknown() {
        let o = AttemptOutcome::adapter_error();
        assert_eq!(o.classification, Some(OutcomeClassification::Unknown));
        assert_eq!(o.reason, Some(FailureReason::AdapterError));
        assert_eq!(o.status, DeliveryStatus::Fail);
    }
}
