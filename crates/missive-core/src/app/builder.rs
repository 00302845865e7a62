//! OrchestratorBuilder - orchestrator の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 必須でない部品は本番向けの既定値で埋める

use std::sync::Arc;

use super::orchestrator::DispatchOrchestrator;
use crate::domain::{MissiveError, PhraseBook, VariationRules};
use crate::impls::JitterRateLimiter;
use crate::ports::{ChannelAdapter, Clock, DeliveryStateStore, RateLimiter, SystemClock};

/// OrchestratorBuilder は DispatchOrchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = DispatchOrchestrator::builder()
///     .channel(Arc::new(channel))
///     .store(Arc::new(JsonFileStateStore::new("send_status.json")))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - channel と store は必須。欠けていれば build() が BuildError を返す
/// - rate limiter / clock / phrases / variation は既定値あり
#[derive(Default)]
pub struct OrchestratorBuilder {
    channel: Option<Arc<dyn ChannelAdapter>>,
    store: Option<Arc<dyn DeliveryStateStore>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    clock: Option<Arc<dyn Clock>>,
    phrases: Option<PhraseBook>,
    variation: Option<VariationRules>,
}

/// BuildError は orchestrator 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These must be supplied before build().")]
    MissingComponents(Vec<&'static str>),
}

impl From<BuildError> for MissiveError {
    fn from(e: BuildError) -> Self {
        MissiveError::Config(e.to_string())
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn store(mut self, store: Arc<dyn DeliveryStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 既定: `JitterRateLimiter::default()`（0.2〜2.0 秒）
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn phrases(mut self, phrases: PhraseBook) -> Self {
        self.phrases = Some(phrases);
        self
    }

    pub fn variation(mut self, rules: VariationRules) -> Self {
        self.variation = Some(rules);
        self
    }

    /// # 検証
    /// - channel / store が設定されているかチェック
    /// - 不足があれば BuildError::MissingComponents を返す
    pub fn build(self) -> Result<DispatchOrchestrator, BuildError> {
        let mut missing = Vec::new();
        if self.channel.is_none() {
            missing.push("channel");
        }
        if self.store.is_none() {
            missing.push("store");
        }
        let (Some(channel), Some(store)) = (self.channel, self.store) else {
            return Err(BuildError::MissingComponents(missing));
        };

        Ok(DispatchOrchestrator {
            channel,
            store,
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(JitterRateLimiter::default())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            phrases: self.phrases.unwrap_or_default(),
            variation: self.variation.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryStateStore, ScriptedChannel};

    #[test]
    fn test_build_success() {
        let orchestrator = OrchestratorBuilder::new()
            .channel(Arc::new(ScriptedChannel::always_success()))
            .store(Arc::new(InMemoryStateStore::new()))
            .build();
        assert!(orchestrator.is_ok());
    }

    #[test]
    fn test_build_fills_defaults() {
        let orchestrator = OrchestratorBuilder::new()
            .channel(Arc::new(ScriptedChannel::always_success()))
            .store(Arc::new(InMemoryStateStore::new()))
            .build()
            .unwrap();
        assert_eq!(orchestrator.variation(), &VariationRules::default());
    }

    #[test]
    fn test_build_missing_components() {
        let result = OrchestratorBuilder::new().build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponents(ref missing)) if missing == &vec!["channel", "store"]
        ));

        let result = OrchestratorBuilder::new()
            .channel(Arc::new(ScriptedChannel::always_success()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponents(ref missing)) if missing == &vec!["store"]
        ));
    }

    #[test]
    fn test_build_error_is_config_error() {
        let err: MissiveError = BuildError::MissingComponents(vec!["store"]).into();
        assert!(err.is_precondition());
    }
}
