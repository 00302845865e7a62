//! Timestamp fields of the state document.
//!
//! 書き出しは常に RFC3339。読み込みは RFC3339 に加えて
//! タイムゾーン無しの `%Y-%m-%d %H:%M:%S` も受け付ける（UTC として解釈）。

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de::Error as _};

/// Naive layout accepted on read.
pub const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// `#[serde(deserialize_with = "timestamp::deserialize")]`
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| D::Error::custom(format!("unrecognised timestamp {raw:?}")))
}
