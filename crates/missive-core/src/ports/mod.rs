//! Ports - 抽象化レイヤー
//!
//! orchestrator が外部（チャネル・ファイル・時刻・待機）に触れる境界。
//! 実装は `impls` に置き、テストでは差し替える。

pub mod channel;
pub mod clock;
pub mod rate_limiter;
pub mod state_store;

pub use self::channel::{ChannelAdapter, ChannelSession, Credentials, SessionOptions};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::rate_limiter::RateLimiter;
pub use self::state_store::DeliveryStateStore;
