//! ScriptedChannel - 台本どおりに応答するチャネル（テスト・dry run 用）
//!
//! # 使用例
//! ```ignore
//! let channel = ScriptedChannel::always_success()
//!     .then(ScriptedReply::text("쪽지 전송이 제한되었습니다"));
//! let stats = channel.stats();
//! // ... run ...
//! assert_eq!(stats.sent().len(), 3);
//! ```
//!
//! 台本（`then` で積んだ応答）を先頭から消費し、尽きたら fallback を返し続ける。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::classifier::SUCCESS_PHRASE;
use crate::domain::{ChannelError, MissiveError, MissiveResult};
use crate::ports::{ChannelAdapter, ChannelSession, Credentials, SessionOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Confirmation text as the channel would show it.
    Text(String),
    /// Adapter error (element missing, driver hiccup, ...).
    Error(String),
    /// The session died.
    SessionLost,
    /// Never answer (simulates a process killed mid-send).
    Hang,
}

impl ScriptedReply {
    pub fn text(s: impl Into<String>) -> Self {
        ScriptedReply::Text(s.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient_id: String,
    pub message: String,
}

type SendHook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct Recording {
    sent: Vec<SentMessage>,
    sessions_opened: usize,
    sessions_closed: usize,
    last_options: Option<SessionOptions>,
}

/// Read-only view of what the channel saw. Cheap to clone.
#[derive(Clone)]
pub struct ScriptStats {
    recording: Arc<Mutex<Recording>>,
}

impl ScriptStats {
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.recording).sent.clone()
    }

    pub fn send_count(&self) -> usize {
        lock(&self.recording).sent.len()
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.recording).sessions_opened
    }

    pub fn sessions_closed(&self) -> usize {
        lock(&self.recording).sessions_closed
    }

    pub fn last_options(&self) -> Option<SessionOptions> {
        lock(&self.recording).last_options
    }
}

pub struct ScriptedChannel {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: ScriptedReply,
    reject_login: Option<String>,
    on_send: Option<SendHook>,
    recording: Arc<Mutex<Recording>>,
}

impl ScriptedChannel {
    pub fn new(fallback: ScriptedReply) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            reject_login: None,
            on_send: None,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// Answers every send with the success phrase.
    pub fn always_success() -> Self {
        Self::new(ScriptedReply::text(SUCCESS_PHRASE))
    }

    pub fn then(self, reply: ScriptedReply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }

    pub fn then_many(self, replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        lock(&self.replies).extend(replies);
        self
    }

    pub fn reject_login(mut self, reason: impl Into<String>) -> Self {
        self.reject_login = Some(reason.into());
        self
    }

    /// Called with the 1-based send count after each send is recorded.
    pub fn on_send(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(hook));
        self
    }

    pub fn stats(&self) -> ScriptStats {
        ScriptStats {
            recording: Arc::clone(&self.recording),
        }
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedChannel {
    async fn open_session(
        &self,
        credentials: &Credentials,
        options: SessionOptions,
    ) -> MissiveResult<Box<dyn ChannelSession>> {
        if let Some(reason) = &self.reject_login {
            return Err(MissiveError::Auth(format!(
                "{} rejected: {reason}",
                credentials.account
            )));
        }
        {
            let mut rec = lock(&self.recording);
            rec.sessions_opened += 1;
            rec.last_options = Some(options);
        }
        Ok(Box::new(ScriptedSession {
            replies: Arc::clone(&self.replies),
            fallback: self.fallback.clone(),
            on_send: self.on_send.clone(),
            recording: Arc::clone(&self.recording),
        }))
    }
}

struct ScriptedSession {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    fallback: ScriptedReply,
    on_send: Option<SendHook>,
    recording: Arc<Mutex<Recording>>,
}

#[async_trait]
impl ChannelSession for ScriptedSession {
    async fn send(&mut self, recipient_id: &str, message: &str) -> Result<String, ChannelError> {
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let count = {
            let mut rec = lock(&self.recording);
            rec.sent.push(SentMessage {
                recipient_id: recipient_id.to_string(),
                message: message.to_string(),
            });
            rec.sent.len()
        };
        if let Some(hook) = &self.on_send {
            hook(count);
        }

        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Error(e) => Err(ChannelError::Protocol(e)),
            ScriptedReply::SessionLost => {
                Err(ChannelError::SessionLost("scripted session loss".into()))
            }
            ScriptedReply::Hang => {
                std::future::pending::<()>().await;
                Ok(String::new())
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), ChannelError> {
        lock(&self.recording).sessions_closed += 1;
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
