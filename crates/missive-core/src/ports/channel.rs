//! Channel port - 送信チャネル（外部コラボレータ）
//!
//! ブラウザ操作・ログイン・要素探索などの具体的な仕組みはすべてこの境界の向こう側。
//! core が依存するのは以下の契約だけ:
//! - `open_session`: 認証してセッションを 1 本確立（失敗は `MissiveError::Auth`）
//! - `send`: 1 件送信して生の確認テキストを返す。確認が見えなければ空文字列
//!
//! # 設計原則
//! - セッションは排他的に 1 本（`&mut self` で送信）
//! - `send` から戻った時点で次の `send` を受け付けられる状態であること
//!   （UI の再準備は adapter の責務）

use std::fmt;

use async_trait::async_trait;

use crate::domain::{ChannelError, MissiveResult};

/// Account credentials for the channel.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            secret: secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.account.trim().is_empty() && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Opaque options forwarded to the adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub headless: bool,
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    async fn open_session(
        &self,
        credentials: &Credentials,
        options: SessionOptions,
    ) -> MissiveResult<Box<dyn ChannelSession>>;
}

#[async_trait]
pub trait ChannelSession: Send {
    /// Send one message and return the raw confirmation text.
    async fn send(&mut self, recipient_id: &str, message: &str) -> Result<String, ChannelError>;

    /// Release the session. Errors here are only logged.
    async fn close(self: Box<Self>) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let c = Credentials::new("me", "hunter2");
        let s = format!("{c:?}");
        assert!(s.contains("me"));
        assert!(!s.contains("hunter2"));
    }

    #[test]
    fn blank_parts_are_incomplete() {
        assert!(Credentials::new("me", "pw").is_complete());
        assert!(!Credentials::new("  ", "pw").is_complete());
        assert!(!Credentials::new("me", "").is_complete());
    }
}
