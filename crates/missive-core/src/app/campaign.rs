//! Campaign - 実行前の入力一式（前提条件チェック込み）
//!
//! # Fail-fast 設計
//! - recipient ファイル・メッセージ・認証情報のどれかが欠けたら
//!   送信も状態ファイルへの書き込みもせずに `Config` / `Data` エラー

use std::path::PathBuf;

use crate::domain::{MessageTemplate, MissiveError, MissiveResult, Recipient};
use crate::ports::{Clock, Credentials};
use crate::recipients::load_recipients;

/// Where the inputs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSources {
    pub recipients: PathBuf,
    pub message: PathBuf,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub recipients: Vec<Recipient>,
    pub template: MessageTemplate,
    pub credentials: Credentials,
}

impl Campaign {
    pub fn new(recipients: Vec<Recipient>, template: MessageTemplate, credentials: Credentials) -> Self {
        Self {
            recipients,
            template,
            credentials,
        }
    }

    /// Load and validate all inputs.
    pub fn prepare(
        sources: &CampaignSources,
        credentials: Credentials,
        clock: &dyn Clock,
    ) -> MissiveResult<Self> {
        let recipients = load_recipients(&sources.recipients, clock.now())?;
        let template = load_template(sources)?;
        if !credentials.is_complete() {
            return Err(MissiveError::Config(
                "channel credentials are missing (account and secret are required)".into(),
            ));
        }
        Ok(Self::new(recipients, template, credentials))
    }
}

fn load_template(sources: &CampaignSources) -> MissiveResult<MessageTemplate> {
    match std::fs::read_to_string(&sources.message) {
        Ok(text) => Ok(MessageTemplate::new(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MissiveError::Config(format!(
            "message template not found: {}",
            sources.message.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SystemClock;
    use std::fs;
    use tempfile::TempDir;

    fn sources(dir: &TempDir) -> CampaignSources {
        CampaignSources {
            recipients: dir.path().join("recipients_preview.csv"),
            message: dir.path().join("message.txt"),
        }
    }

    fn write_inputs(dir: &TempDir) {
        fs::write(dir.path().join("recipients_preview.csv"), "후원아이디\na\nb\n").unwrap();
        fs::write(dir.path().join("message.txt"), "안녕하세요\r\n감사합니다").unwrap();
    }

    #[test]
    fn prepares_complete_inputs() {
        let dir = TempDir::new().unwrap();
        write_inputs(&dir);
        let campaign =
            Campaign::prepare(&sources(&dir), Credentials::new("me", "pw"), &SystemClock).unwrap();
        assert_eq!(campaign.recipients.len(), 2);
        assert_eq!(campaign.template.as_str(), "안녕하세요\n감사합니다");
    }

    #[test]
    fn missing_recipient_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("message.txt"), "hi").unwrap();
        let err = Campaign::prepare(&sources(&dir), Credentials::new("me", "pw"), &SystemClock)
            .unwrap_err();
        assert!(matches!(err, MissiveError::Config(_)));
    }

    #[test]
    fn missing_template_is_config_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("recipients_preview.csv"), "id\na\n").unwrap();
        let err = Campaign::prepare(&sources(&dir), Credentials::new("me", "pw"), &SystemClock)
            .unwrap_err();
        match err {
            MissiveError::Config(msg) => assert!(msg.contains("message template")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn blank_credentials_are_config_error() {
        let dir = TempDir::new().unwrap();
        write_inputs(&dir);
        let err = Campaign::prepare(&sources(&dir), Credentials::new("me", " "), &SystemClock)
            .unwrap_err();
        assert!(err.is_precondition());
    }
}
