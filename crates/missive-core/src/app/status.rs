//! Status - 進捗の読み取り専用ビュー
//!
//! 状態ファイルを毎回読み直すだけの stateless なビュー。
//! 送信 task と共有するメモリは持たない（writer は orchestrator ただ 1 つ）。

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryState, DeliveryStatus, FailureReason, MissiveResult};
use crate::ports::DeliveryStateStore;

/// Number of most recent rows shown.
pub const RECENT_ROWS: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub index: usize,
    pub id: String,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub counts: StatusCounts,
    pub created: Option<DateTime<Utc>>,
    /// Last `RECENT_ROWS` items in index order.
    pub recent: Vec<StatusRow>,
}

impl StatusSnapshot {
    /// Snapshot of "nothing persisted yet".
    pub fn empty() -> Self {
        Self {
            counts: StatusCounts::default(),
            created: None,
            recent: Vec::new(),
        }
    }

    pub fn from_state(state: &DeliveryState) -> Self {
        let counts = StatusCounts {
            total: state.len(),
            success: state.count(DeliveryStatus::Success),
            fail: state.count(DeliveryStatus::Fail),
            pending: state.count(DeliveryStatus::Pending),
        };
        let skip = state.len().saturating_sub(RECENT_ROWS);
        let recent = state
            .items
            .iter()
            .skip(skip)
            .map(|r| StatusRow {
                index: r.index,
                id: r.id.clone(),
                status: r.status,
                reason: r.reason,
                updated: r.updated_at,
            })
            .collect();
        Self {
            counts,
            created: Some(state.meta.created_at),
            recent,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.counts.total > 0 && self.counts.pending == 0
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(created) = self.created else {
            return writeln!(f, "no delivery state yet");
        };
        let c = &self.counts;
        writeln!(
            f,
            "total {}  success {}  fail {}  pending {}  (created {})",
            c.total,
            c.success,
            c.fail,
            c.pending,
            created.format("%Y-%m-%d %H:%M:%S")
        )?;
        for row in &self.recent {
            let reason = row.reason.map(FailureReason::as_str).unwrap_or("");
            writeln!(
                f,
                "{:>5}  {:<24}  {:<8}  {:<14}  {}",
                row.index,
                row.id,
                row.status,
                reason,
                row.updated.format("%H:%M:%S")
            )?;
        }
        Ok(())
    }
}

/// Reads the store on demand.
pub struct StatusView {
    store: Arc<dyn DeliveryStateStore>,
}

impl StatusView {
    pub fn new(store: Arc<dyn DeliveryStateStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> MissiveResult<StatusSnapshot> {
        Ok(match self.store.load()? {
            Some(state) => StatusSnapshot::from_state(&state),
            None => StatusSnapshot::empty(),
        })
    }
}
