//! CommandChannel - 外部ヘルパープロセス経由のチャネル
//!
//! UI 操作（ログイン・入力・ボタン・確認モーダルの読み取り）は別プロセスの
//! ドライバに任せ、ここでは stdin/stdout 上の JSON lines で会話するだけ。
//!
//! # プロトコル
//! ```text
//! -> {"op":"login","seq":1,"account":"..","secret":"..","headless":true}
//! <- {"seq":1,"ok":true}
//! -> {"op":"send","seq":2,"to":"panda01","message":"..."}
//! <- {"seq":2,"ok":true,"text":"성공적으로 보냈습니다."}
//! -> {"op":"quit","seq":3}
//! ```
//! - 確認待ちは `confirm_timeout` で打ち切り、空文字列を返す
//! - 遅れて届いた古い `seq` の応答は読み捨てる
//! - stdout が閉じたら `SessionLost`

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::domain::{ChannelError, MissiveError, MissiveResult};
use crate::ports::{ChannelAdapter, ChannelSession, Credentials, SessionOptions};

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(6);
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Login {
        seq: u64,
        account: &'a str,
        secret: &'a str,
        headless: bool,
    },
    Send {
        seq: u64,
        to: &'a str,
        message: &'a str,
    },
    Quit {
        seq: u64,
    },
}

#[derive(Debug, Deserialize)]
struct Reply {
    seq: u64,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandChannel {
    argv: Vec<String>,
    confirm_timeout: Duration,
    login_timeout: Duration,
}

impl CommandChannel {
    /// `argv[0]` is the program, the rest its arguments.
    pub fn new(argv: Vec<String>) -> MissiveResult<Self> {
        if argv.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(MissiveError::Config(
                "channel command is empty; set [channel].command".into(),
            ));
        }
        Ok(Self {
            argv,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        })
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    fn command(&self, options: SessionOptions) -> Command {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        if options.headless {
            cmd.arg("--headless");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ChannelAdapter for CommandChannel {
    async fn open_session(
        &self,
        credentials: &Credentials,
        options: SessionOptions,
    ) -> MissiveResult<Box<dyn ChannelSession>> {
        let mut child = self.command(options).spawn().map_err(ChannelError::Io)?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ChannelError::Protocol("helper stdio was not captured".into()).into());
        };

        let mut session = CommandSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_seq: 1,
            confirm_timeout: self.confirm_timeout,
        };

        let seq = session.bump_seq();
        session
            .write(&Request::Login {
                seq,
                account: &credentials.account,
                secret: &credentials.secret,
                headless: options.headless,
            })
            .await?;

        let reply = match tokio::time::timeout(self.login_timeout, session.read_reply(seq)).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(MissiveError::Auth(format!(
                    "no login confirmation within {} ms",
                    self.login_timeout.as_millis()
                )));
            }
        };
        if !reply.ok {
            return Err(MissiveError::Auth(
                reply.error.unwrap_or_else(|| "login rejected".into()),
            ));
        }

        tracing::info!(program = %self.argv[0], headless = options.headless, "channel session open");
        Ok(Box::new(session))
    }
}

struct CommandSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_seq: u64,
    confirm_timeout: Duration,
}

impl CommandSession {
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    async fn write(&mut self, request: &Request<'_>) -> Result<(), ChannelError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| ChannelError::Protocol(format!("encode request: {e}")))?;
        line.push('\n');
        let written = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await
        }
        .await;
        written.map_err(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe => ChannelError::SessionLost("helper stdin closed".into()),
            _ => ChannelError::Io(e),
        })
    }

    /// Read until the reply for `seq` shows up. Older replies are dropped.
    async fn read_reply(&mut self, seq: u64) -> Result<Reply, ChannelError> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(ChannelError::SessionLost("helper closed its output".into()));
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let reply: Reply = match serde_json::from_str(line) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::debug!(error = %e, line, "ignoring non-protocol helper output");
                    continue;
                }
            };
            if reply.seq == seq {
                return Ok(reply);
            }
            tracing::debug!(expected = seq, got = reply.seq, "dropping stale helper reply");
        }
    }
}

#[async_trait]
impl ChannelSession for CommandSession {
    async fn send(&mut self, recipient_id: &str, message: &str) -> Result<String, ChannelError> {
        let seq = self.bump_seq();
        self.write(&Request::Send {
            seq,
            to: recipient_id,
            message,
        })
        .await?;

        let reply = match tokio::time::timeout(self.confirm_timeout, self.read_reply(seq)).await {
            Ok(reply) => reply?,
            Err(_) => return Ok(String::new()),
        };
        if reply.ok {
            Ok(reply.text)
        } else {
            Err(ChannelError::Rejected(
                reply.error.unwrap_or_else(|| "send failed".into()),
            ))
        }
    }

    async fn close(mut self: Box<Self>) -> Result<(), ChannelError> {
        let seq = self.bump_seq();
        // helper がすでに終了していれば quit は届かないが問題ない
        let _ = self.write(&Request::Quit { seq }).await;
        let CommandSession {
            mut child, stdin, ..
        } = *self;
        drop(stdin);
        match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                child.start_kill()?;
            }
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const ECHO_SUCCESS: &str = r#"
while IFS= read -r line; do
  seq=$(printf '%s' "$line" | sed 's/.*"seq":\([0-9]*\).*/\1/')
  case "$line" in
    *'"op":"quit"'*) exit 0 ;;
  esac
  printf '{"seq":%s,"ok":true,"text":"성공적으로 보냈습니다."}\n' "$seq"
done
"#;

    const LOGIN_THEN_SILENT: &str = r#"
IFS= read -r line
printf '{"seq":1,"ok":true}\n'
while IFS= read -r line; do :; done
"#;

    const LOGIN_THEN_EXIT: &str = r#"
IFS= read -r line
printf '{"seq":1,"ok":true}\n'
exit 0
"#;

    const REJECT_LOGIN: &str = r#"
IFS= read -r line
printf '{"seq":1,"ok":false,"error":"wrong password"}\n'
"#;

    fn sh(script: &str) -> CommandChannel {
        CommandChannel::new(vec!["sh".into(), "-c".into(), script.into()])
            .unwrap()
            .with_confirm_timeout(Duration::from_millis(300))
            .with_login_timeout(Duration::from_secs(5))
    }

    fn creds() -> Credentials {
        Credentials::new("me", "pw")
    }

    #[test]
    fn empty_command_is_a_config_error() {
        assert!(matches!(
            CommandChannel::new(vec![]),
            Err(MissiveError::Config(_))
        ));
        assert!(matches!(
            CommandChannel::new(vec!["  ".into()]),
            Err(MissiveError::Config(_))
        ));
    }

    #[test]
    fn requests_are_tagged_by_op() {
        let v = serde_json::to_value(Request::Send {
            seq: 7,
            to: "a",
            message: "m",
        })
        .unwrap();
        assert_eq!(v["op"], "send");
        assert_eq!(v["seq"], 7);
        assert_eq!(v["to"], "a");
    }

    #[tokio::test]
    async fn login_and_send_roundtrip() {
        let channel = sh(ECHO_SUCCESS);
        let mut session = channel
            .open_session(&creds(), SessionOptions::default())
            .await
            .unwrap();
        let text = session.send("panda01", "안녕\n하세요").await.unwrap();
        assert_eq!(text, "성공적으로 보냈습니다.");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_confirmation_is_empty_text() {
        let channel = sh(LOGIN_THEN_SILENT);
        let mut session = channel
            .open_session(&creds(), SessionOptions::default())
            .await
            .unwrap();
        assert_eq!(session.send("a", "m").await.unwrap(), "");
    }

    #[tokio::test]
    async fn helper_exit_is_session_lost() {
        let channel = sh(LOGIN_THEN_EXIT);
        let mut session = channel
            .open_session(&creds(), SessionOptions::default())
            .await
            .unwrap();
        let err = session.send("a", "m").await.unwrap_err();
        assert!(matches!(err, ChannelError::SessionLost(_)), "{err:?}");
    }

    #[tokio::test]
    async fn rejected_login_is_auth_error() {
        let err = sh(REJECT_LOGIN)
            .open_session(&creds(), SessionOptions::default())
            .await
            .err()
            .unwrap();
        match err {
            MissiveError::Auth(msg) => assert!(msg.contains("wrong password")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_fails_to_open() {
        let channel = CommandChannel::new(vec!["/nonexistent/missive-helper".into()]).unwrap();
        assert!(
            channel
                .open_session(&creds(), SessionOptions::default())
                .await
                .is_err()
        );
    }
}
