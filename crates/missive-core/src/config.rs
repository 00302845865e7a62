//! Configuration file (`missive.toml`).
//!
//! Every field has a default, so an absent file is the same as an empty one.
//!
//! ```toml
//! [paths]
//! recipients = "recipients_preview.csv"
//! message = "message.txt"
//! status = "send_status.json"
//!
//! [pacing]
//! min_delay_ms = 200
//! max_delay_ms = 2000
//!
//! [channel]
//! command = ["python3", "driver.py"]
//! confirm_timeout_ms = 6000
//! login_timeout_ms = 10000
//!
//! [phrases]
//! success = ["Message sent"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{MissiveError, MissiveResult, PhraseBook, VariationRules};
use crate::impls::{CommandChannel, JitterRateLimiter};

pub const DEFAULT_CONFIG_FILE: &str = "missive.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissiveConfig {
    pub paths: PathsConfig,
    pub pacing: PacingConfig,
    pub channel: ChannelConfig,
    pub phrases: PhrasesConfig,
    pub variation: VariationRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub recipients: PathBuf,
    pub message: PathBuf,
    pub status: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            recipients: PathBuf::from("recipients_preview.csv"),
            message: PathBuf::from("message.txt"),
            status: PathBuf::from("send_status.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 2000,
        }
    }
}

impl PacingConfig {
    pub fn rate_limiter(&self) -> JitterRateLimiter {
        JitterRateLimiter::new(
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Helper program and its arguments.
    pub command: Vec<String>,
    pub confirm_timeout_ms: u64,
    pub login_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            confirm_timeout_ms: 6000,
            login_timeout_ms: 10_000,
        }
    }
}

impl ChannelConfig {
    pub fn command_channel(&self) -> MissiveResult<CommandChannel> {
        Ok(CommandChannel::new(self.command.clone())?
            .with_confirm_timeout(Duration::from_millis(self.confirm_timeout_ms))
            .with_login_timeout(Duration::from_millis(self.login_timeout_ms)))
    }
}

/// Extra phrases, added to the built-in vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhrasesConfig {
    pub success: Vec<String>,
    pub restricted: Vec<String>,
    pub rate_limited: Vec<String>,
}

impl PhrasesConfig {
    pub fn phrase_book(&self) -> PhraseBook {
        PhraseBook::default().extend(&self.success, &self.restricted, &self.rate_limited)
    }
}

impl MissiveConfig {
    pub fn from_toml_str(raw: &str) -> MissiveResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load configuration.
    ///
    /// - `Some(path)`: the file must exist.
    /// - `None`: `missive.toml` in the working directory if present,
    ///   defaults otherwise.
    pub fn load(path: Option<&Path>) -> MissiveResult<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let config = Self::from_toml_str(&raw)?;
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MissiveError::Config(
                format!("config file not found: {}", path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
