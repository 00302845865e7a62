//! State - 配送状態ドキュメント
//!
//! `DeliveryState` は 1 キャンペーン分の per-recipient ledger で、
//! ディスク上の JSON ドキュメントと 1:1 に対応する（source of truth）。
//!
//! # 不変条件
//! - `items.len()` は最後の reset 時点の recipient 数と一致
//! - `items[i].index == i`（load 順の dense な 0..N-1）
//! - status は Pending -> {Success, Fail} のみ、terminal は二度と開かない

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{MissiveError, MissiveResult};
use super::recipient::{DeliveryStatus, FailureReason, Recipient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMeta {
    #[serde(rename = "created", deserialize_with = "super::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryState {
    pub items: Vec<Recipient>,
    pub meta: StateMeta,
}

/// What `reconcile` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// The persisted state was kept as-is (resume).
    Resumed,
    /// A fresh all-pending state was built.
    Fresh,
}

impl DeliveryState {
    /// Build a fresh state: every loaded recipient `Pending`, indices
    /// renumbered to load order.
    pub fn fresh(loaded: &[Recipient], now: DateTime<Utc>) -> Self {
        let items = loaded
            .iter()
            .enumerate()
            .map(|(index, r)| Recipient {
                index,
                ..r.reopened(now)
            })
            .collect();
        Self {
            items,
            meta: StateMeta { created_at: now },
        }
    }

    /// Resume or reset.
    ///
    /// Fresh state when `reset` is requested, nothing is persisted yet,
    /// the persisted state is empty, or its length no longer matches the
    /// loaded table. Otherwise the persisted state is returned untouched.
    pub fn reconcile(
        loaded: &[Recipient],
        existing: Option<DeliveryState>,
        reset: bool,
        now: DateTime<Utc>,
    ) -> (Self, Reconciliation) {
        match existing {
            Some(state)
                if !reset && !state.items.is_empty() && state.items.len() == loaded.len() =>
            {
                (state, Reconciliation::Resumed)
            }
            _ => (Self::fresh(loaded, now), Reconciliation::Fresh),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Move one recipient out of `Pending`.
    ///
    /// Rejects anything but Pending -> Success / Pending -> Fail.
    pub fn settle(
        &mut self,
        index: usize,
        status: DeliveryStatus,
        reason: Option<FailureReason>,
        now: DateTime<Utc>,
    ) -> MissiveResult<()> {
        let Some(item) = self.items.get_mut(index) else {
            return Err(MissiveError::Data(format!(
                "recipient #{index} is not part of the state document"
            )));
        };
        if item.status.is_terminal() || !status.is_terminal() {
            return Err(MissiveError::InvalidTransition {
                index,
                from: item.status.as_str(),
                to: status.as_str(),
            });
        }
        item.status = status;
        item.reason = reason;
        item.updated_at = now;
        Ok(())
    }

    pub fn count(&self, status: DeliveryStatus) -> usize {
        self.items.iter().filter(|r| r.status == status).count()
    }

    pub fn terminal_count(&self) -> usize {
        self.items.iter().filter(|r| r.status.is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
    }

    fn loaded(ids: &[&str]) -> Vec<Recipient> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Recipient::new(i, *id, t0()))
            .collect()
    }

    #[test]
    fn fresh_state_is_all_pending_with_dense_indices() {
        let mut rows = loaded(&["a", "b", "c"]);
        rows[1].index = 42;
        rows[2].status = DeliveryStatus::Success;

        let state = DeliveryState::fresh(&rows, t1());
        assert_eq!(state.len(), 3);
        for (i, item) in state.items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.status, DeliveryStatus::Pending);
            assert_eq!(item.updated_at, t1());
        }
        assert_eq!(state.meta.created_at, t1());
    }

    #[test]
    fn reconcile_resumes_matching_state() {
        let rows = loaded(&["a", "b"]);
        let mut existing = DeliveryState::fresh(&rows, t0());
        existing
            .settle(0, DeliveryStatus::Success, None, t0())
            .unwrap();

        let (state, decision) = DeliveryState::reconcile(&rows, Some(existing.clone()), false, t1());
        assert_eq!(decision, Reconciliation::Resumed);
        assert_eq!(state, existing);
    }

    #[test]
    fn reconcile_resets_on_request() {
        let rows = loaded(&["a", "b"]);
        let mut existing = DeliveryState::fresh(&rows, t0());
        existing.settle(0, DeliveryStatus::Fail, None, t0()).unwrap();

        let (state, decision) = DeliveryState::reconcile(&rows, Some(existing), true, t1());
        assert_eq!(decision, Reconciliation::Fresh);
        assert_eq!(state.count(DeliveryStatus::Pending), 2);
        assert_eq!(state.meta.created_at, t1());
    }

    #[test]
    fn reconcile_resets_on_length_mismatch() {
        let existing = DeliveryState::fresh(&loaded(&["a", "b"]), t0());
        let rows = loaded(&["a", "b", "c"]);
        let (state, decision) = DeliveryState::reconcile(&rows, Some(existing), false, t1());
        assert_eq!(decision, Reconciliation::Fresh);
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn reconcile_resets_on_missing_or_empty_state() {
        let rows = loaded(&["a"]);
        let (_, decision) = DeliveryState::reconcile(&rows, None, false, t1());
        assert_eq!(decision, Reconciliation::Fresh);

        let empty = DeliveryState::fresh(&[], t0());
        let (_, decision) = DeliveryState::reconcile(&rows, Some(empty), false, t1());
        assert_eq!(decision, Reconciliation::Fresh);
    }

    #[test]
    fn settle_rejects_reopening_terminal_items() {
        let mut state = DeliveryState::fresh(&loaded(&["a"]), t0());
        state
            .settle(0, DeliveryStatus::Fail, Some(FailureReason::Unknown), t1())
            .unwrap();

        let err = state
            .settle(0, DeliveryStatus::Success, None, t1())
            .unwrap_err();
        assert!(matches!(err, MissiveError::InvalidTransition { index: 0, .. }));
        assert_eq!(state.items[0].status, DeliveryStatus::Fail);
        assert_eq!(state.items[0].reason, Some(FailureReason::Unknown));
    }

    #[test]
    fn settle_rejects_pending_as_target() {
        let mut state = DeliveryState::fresh(&loaded(&["a"]), t0());
        assert!(state.settle(0, DeliveryStatus::Pending, None, t1()).is_err());
    }

    #[test]
    fn settle_out_of_range_is_an_error() {
        let mut state = DeliveryState::fresh(&loaded(&["a"]), t0());
        assert!(state.settle(5, DeliveryStatus::Success, None, t1()).is_err());
    }

    #[test]
    fn document_shape_matches_persisted_format() {
        let state = DeliveryState::fresh(&loaded(&["a"]), t0());
        let v = serde_json::to_value(&state).unwrap();
        assert!(v["items"].is_array());
        assert!(v["meta"]["created"].is_string());
        assert_eq!(v["items"][0]["status"], "pending");
    }
}
