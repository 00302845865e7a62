//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **JsonFileStateStore**: 本番用の状態ドキュメント（atomic rewrite）
//! - **InMemoryStateStore**: テスト用
//! - **JitterRateLimiter** / **NoDelay**: 送信間隔
//! - **CommandChannel**: 外部ヘルパープロセスを駆動する本番用チャネル
//! - **ScriptedChannel**: 台本どおりに応答するチャネル（テスト・dry run）

pub mod command_channel;
pub mod jitter;
pub mod json_store;
pub mod memory_store;
pub mod scripted_channel;

pub use self::command_channel::CommandChannel;
pub use self::jitter::{JitterRateLimiter, NoDelay};
pub use self::json_store::JsonFileStateStore;
pub use self::memory_store::InMemoryStateStore;
pub use self::scripted_channel::{ScriptStats, ScriptedChannel, ScriptedReply, SentMessage};
