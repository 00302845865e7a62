//! DeliveryStateStore port - 配送状態の正本（source of truth）
//!
//! # 設計原則
//! - 書き込みはドキュメント全体の atomic な置き換え（部分書き込みは読み手に見えない）
//! - writer は常に 1 つ（orchestrator）、reader（status view）はロック不要
//! - 存在しない場合 `load` は `None`

use crate::domain::{DeliveryState, MissiveResult};

pub trait DeliveryStateStore: Send + Sync {
    fn load(&self) -> MissiveResult<Option<DeliveryState>>;

    /// Replace the whole document.
    fn save(&self, state: &DeliveryState) -> MissiveResult<()>;

    /// Remove the document (operator action).
    fn clear(&self) -> MissiveResult<()>;
}
