//! Errors - エラー型と分類
//!
//! # 分類
//! - **致命的（run を中断）**: `Config`, `Data`, `Auth`, 永続化失敗（`Io`, `Json`）
//! - **局所的（1 件だけ Fail）**: `ChannelError` は orchestrator 内で
//!   `FailureReason` に畳み込まれ、呼び出し元には伝播しない

use thiserror::Error;

/// MissiveError はライブラリ全体のエラー
#[derive(Debug, Error)]
pub enum MissiveError {
    /// Missing input file, template or credentials.
    #[error("configuration error: {0}")]
    Config(String),

    /// Recipient table is present but unusable (e.g. no identifier column).
    #[error("data error: {0}")]
    Data(String),

    /// Session could not be established with the channel.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Channel failure that escaped per-recipient handling (session level).
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Attempted to move a recipient out of a terminal status.
    #[error("invalid status transition for recipient #{index}: {from} -> {to}")]
    InvalidTransition {
        index: usize,
        from: &'static str,
        to: &'static str,
    },

    /// Background dispatch task panicked or was killed.
    #[error("dispatch worker failed: {0}")]
    Worker(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MissiveError {
    /// Fatal errors abort a run; everything else is handled per recipient.
    pub fn is_precondition(&self) -> bool {
        matches!(self, MissiveError::Config(_) | MissiveError::Data(_))
    }
}

/// ChannelError は Channel Adapter の失敗
///
/// orchestrator はこれを「確認テキストなし」として扱う（`SessionLost` を除く）。
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel io: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel protocol: {0}")]
    Protocol(String),

    /// The session is gone; no further sends are possible.
    #[error("channel session lost: {0}")]
    SessionLost(String),

    #[error("channel rejected request: {0}")]
    Rejected(String),
}

/// Result type for library operations.
pub type MissiveResult<T> = Result<T, MissiveError>;
