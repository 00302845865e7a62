//! InMemoryStateStore - テスト・dry run 用の状態ストア
//!
//! # 学習ポイント
//! - 保存回数を数えられる（checkpoint が 1 attempt ごとに走ることの検証用）
//! - `fail_saves_after` で永続化失敗を再現できる

use std::sync::Mutex;
use std::sync::PoisonError;

use crate::domain::{DeliveryState, MissiveResult};
use crate::ports::DeliveryStateStore;

#[derive(Debug, Default)]
struct Inner {
    state: Option<DeliveryState>,
    saves: usize,
    fail_after: Option<usize>,
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    inner: Mutex<Inner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: DeliveryState) -> Self {
        let store = Self::new();
        store.lock().state = Some(state);
        store
    }

    /// Saves beyond the first `n` fail with an io error.
    pub fn fail_saves_after(self, n: usize) -> Self {
        self.lock().fail_after = Some(n);
        self
    }

    pub fn snapshot(&self) -> Option<DeliveryState> {
        self.lock().state.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliveryStateStore for InMemoryStateStore {
    fn load(&self) -> MissiveResult<Option<DeliveryState>> {
        Ok(self.lock().state.clone())
    }

    fn save(&self, state: &DeliveryState) -> MissiveResult<()> {
        let mut inner = self.lock();
        if inner.fail_after.is_some_and(|n| inner.saves >= n) {
            return Err(std::io::Error::other("simulated write failure").into());
        }
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }

    fn clear(&self) -> MissiveResult<()> {
        self.lock().state = None;
        Ok(())
    }
}
