//! RateLimiter port - 送信間隔の制御
//!
//! 実送信 1 件ごとに 1 回呼ばれる（結果に関係なく）。スキップした行では呼ばれない。

use async_trait::async_trait;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn delay(&self);
}
