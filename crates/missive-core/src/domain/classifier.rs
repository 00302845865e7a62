//! Outcome classifier - 確認テキストから結果を判定
//!
//! # 設計原則
//! - 保守的: 明示的な成功フレーズが無ければ成功扱いしない
//! - 語彙（PhraseBook）は orchestrator から独立して拡張可能
//!
//! 判定順: Success -> Restricted -> RateLimited -> Unknown

use serde::{Deserialize, Serialize};

pub const SUCCESS_PHRASE: &str = "성공적으로 보냈습니다.";
pub const RESTRICTED_PHRASE: &str = "VIP 등급 아래인 경우 쪽지 수신을 제한";
pub const RATE_LIMITED_PHRASE: &str = "쪽지 전송이 제한되었습니다";

/// Closed outcome taxonomy for one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClassification {
    Success,
    Restricted,
    RateLimited,
    Unknown,
}

/// Known confirmation phrases, one list per class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseBook {
    pub success: Vec<String>,
    pub restricted: Vec<String>,
    pub rate_limited: Vec<String>,
}

impl Default for PhraseBook {
    fn default() -> Self {
        Self {
            success: vec![SUCCESS_PHRASE.to_string()],
            restricted: vec![RESTRICTED_PHRASE.to_string()],
            rate_limited: vec![RATE_LIMITED_PHRASE.to_string()],
        }
    }
}

impl PhraseBook {
    /// Add phrases on top of the current vocabulary. Blank entries are
    /// ignored; phrases are stored whitespace-normalized.
    pub fn extend(
        mut self,
        success: &[String],
        restricted: &[String],
        rate_limited: &[String],
    ) -> Self {
        push_normalized(&mut self.success, success);
        push_normalized(&mut self.restricted, restricted);
        push_normalized(&mut self.rate_limited, rate_limited);
        self
    }

    /// Classify raw confirmation text.
    pub fn classify(&self, raw: &str) -> OutcomeClassification {
        let text = normalize_whitespace(raw);
        if text.is_empty() {
            return OutcomeClassification::Unknown;
        }
        if contains_any(&text, &self.success) {
            OutcomeClassification::Success
        } else if contains_any(&text, &self.restricted) {
            OutcomeClassification::Restricted
        } else if contains_any(&text, &self.rate_limited) {
            OutcomeClassification::RateLimited
        } else {
            OutcomeClassification::Unknown
        }
    }
}

fn push_normalized(into: &mut Vec<String>, extra: &[String]) {
    for phrase in extra {
        let phrase = normalize_whitespace(phrase);
        if !phrase.is_empty() && !into.contains(&phrase) {
            into.push(phrase);
        }
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && text.contains(needle.as_str()))
}
