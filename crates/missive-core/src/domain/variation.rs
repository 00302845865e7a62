//! Message variation: deterministic, invisible per-attempt mutations.
//!
//! Channels tend to suppress identical repeated content. Every `block_size`
//! consecutive sends share one variant; the next block moves a run of
//! invisible separators to the next line, and once every line has had its
//! turn the run grows by one.
//!
//! For a template with `L` lines and attempt sequence number `n`:
//! - `block = n / block_size`
//! - `target_line = block % L`
//! - `separators = 1 + block / L`
//!
//! The result is cut to at most `max_units` characters (plain prefix cut).

use serde::{Deserialize, Serialize};

/// Ideographic space (U+3000): renders blank, survives trimming of ASCII
/// whitespace by the channel.
pub const DEFAULT_SEPARATOR: char = '\u{3000}';
pub const DEFAULT_BLOCK_SIZE: u64 = 5;
pub const DEFAULT_MAX_UNITS: usize = 500;

/// Knobs for [`vary`]. Defaults reproduce the channel's limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationRules {
    pub separator: char,
    pub block_size: u64,
    pub max_units: usize,
}

impl Default for VariationRules {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            block_size: DEFAULT_BLOCK_SIZE,
            max_units: DEFAULT_MAX_UNITS,
        }
    }
}

/// Base message, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    text: String,
}

impl MessageTemplate {
    /// CRLF / CR line endings are folded to LF so separators land at the
    /// visible end of each line.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into().replace("\r\n", "\n").replace('\r', "\n");
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    pub fn vary(&self, n: u64, rules: &VariationRules) -> String {
        vary(&self.text, n, rules)
    }

    /// The first `count` variants, in send order.
    pub fn preview(&self, count: usize, rules: &VariationRules) -> Vec<String> {
        (0..count as u64).map(|n| self.vary(n, rules)).collect()
    }
}

/// Pure variation function. Same inputs, same output.
pub fn vary(template: &str, n: u64, rules: &VariationRules) -> String {
    let mut lines: Vec<String> = template.split('\n').map(str::to_owned).collect();
    let line_count = lines.len() as u64; // split always yields at least one line

    let block = n / rules.block_size.max(1);
    let target_line = (block % line_count) as usize;
    let separators = 1 + (block / line_count) as usize;

    lines[target_line].extend(std::iter::repeat_n(rules.separator, separators));

    let joined = lines.join("\n");
    truncate_units(joined, rules.max_units)
}

fn truncate_units(text: String, max_units: usize) -> String {
    match text.char_indices().nth(max_units) {
        Some((byte_idx, _)) => text[..byte_idx].to_owned(),
        None => text,
    }
}
