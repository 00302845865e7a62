//! Recipient model and its delivery status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-recipient delivery status.
///
/// State transitions:
/// - Pending -> Success
/// - Pending -> Fail
///
/// Success and Fail are terminal; nothing in the engine reopens them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Fail,
}

impl DeliveryStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Fail)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Why a recipient ended up as `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Identifier cell was empty; the channel was never contacted.
    BlankId,
    /// No recognised confirmation (timeout, empty or unfamiliar text).
    Unknown,
    /// Recipient's tier does not accept messages.
    Restricted,
    /// Channel throttled the sender.
    RateLimited,
    /// Adapter raised an error during the send.
    AdapterError,
    /// Session died mid-send.
    SessionLost,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::BlankId => "blank_id",
            FailureReason::Unknown => "unknown",
            FailureReason::Restricted => "restricted",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::AdapterError => "adapter_error",
            FailureReason::SessionLost => "session_lost",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One row of the campaign, as persisted in the state document.
///
/// `index` is the ordinal position in the loaded table and never changes
/// for the lifetime of a state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub index: usize,
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(default)]
    pub hearts: u64,

    pub status: DeliveryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,

    #[serde(rename = "updated", deserialize_with = "super::timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    pub fn new(index: usize, id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            index,
            id: id.into(),
            nickname: None,
            hearts: 0,
            status: DeliveryStatus::Pending,
            reason: None,
            updated_at: now,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        let nickname = nickname.into();
        self.nickname = (!nickname.is_empty()).then_some(nickname);
        self
    }

    pub fn with_hearts(mut self, hearts: u64) -> Self {
        self.hearts = hearts;
        self
    }

    /// Identifier as it will be handed to the channel (surrounding
    /// whitespace removed). Empty means the row cannot be dispatched.
    pub fn dispatch_id(&self) -> &str {
        self.id.trim()
    }

    pub fn has_blank_id(&self) -> bool {
        self.dispatch_id().is_empty()
    }

    /// A copy of this recipient reset to `Pending`.
    pub fn reopened(&self, now: DateTime<Utc>) -> Self {
        Self {
            status: DeliveryStatus::Pending,
            reason: None,
            updated_at: now,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_serializes_lowercase() {
        let s = serde_json::to_string(&DeliveryStatus::Pending).unwrap();
        assert_eq!(s, "\"pending\"");
        let s = serde_json::to_string(&DeliveryStatus::Fail).unwrap();
        assert_eq!(s, "\"fail\"");
    }

    #[test]
    fn only_success_and_fail_are_terminal() {
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Fail.is_terminal());
    }

    #[test]
    fn recipient_uses_document_field_names() {
        let r = Recipient::new(3, "panda01", t0()).with_hearts(1200);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["index"], 3);
        assert_eq!(v["id"], "panda01");
        assert_eq!(v["hearts"], 1200);
        assert_eq!(v["status"], "pending");
        assert!(v.get("updated").is_some());
        assert!(v.get("reason").is_none());
        assert!(v.get("nickname").is_none());
    }

    #[test]
    fn missing_optional_fields_default_on_read() {
        let raw = r#"{"index":0,"id":"a","status":"success","updated":"2024-01-01T12:00:00Z"}"#;
        let r: Recipient = serde_json::from_str(raw).unwrap();
        assert_eq!(r.hearts, 0);
        assert_eq!(r.reason, None);
        assert_eq!(r.status, DeliveryStatus::Success);
    }

    #[test]
    fn blank_id_detection_ignores_whitespace() {
        assert!(Recipient::new(0, "   ", t0()).has_blank_id());
        assert!(!Recipient::new(0, " x ", t0()).has_blank_id());
        assert_eq!(Recipient::new(0, " x ", t0()).dispatch_id(), "x");
    }

    #[test]
    fn empty_nickname_is_dropped() {
        let r = Recipient::new(0, "a", t0()).with_nickname("");
        assert_eq!(r.nickname, None);
    }
}
