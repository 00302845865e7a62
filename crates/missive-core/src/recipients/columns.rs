//! Column resolution and cell parsing for recipient tables.

/// Header names accepted for each column, compared with all whitespace
/// removed.
pub const ID_CANDIDATES: &[&str] = &[
    "후원아이디",
    "아이디",
    "ID",
    "id",
    "userId",
    "후원 아이디",
    "후원 아이디(닉네임)",
];
pub const NICKNAME_CANDIDATES: &[&str] = &["닉네임", "후원닉네임", "닉", "별명", "name", "nick"];
pub const HEARTS_CANDIDATES: &[&str] = &["후원하트", "하트", "hearts", "heart", "총하트", "하트수"];

const DELIMITERS: &[u8] = b",\t;|";

/// Positions of the columns this loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: usize,
    pub nickname: Option<usize>,
    pub hearts: Option<usize>,
}

impl ColumnMap {
    /// `None` when no identifier column is present.
    pub fn resolve<'a>(headers: impl IntoIterator<Item = &'a str> + Clone) -> Option<Self> {
        Some(Self {
            id: pick(headers.clone(), ID_CANDIDATES)?,
            nickname: pick(headers.clone(), NICKNAME_CANDIDATES),
            hearts: pick(headers, HEARTS_CANDIDATES),
        })
    }
}

fn squash(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// First header (in table order) matching any candidate.
fn pick<'a>(headers: impl IntoIterator<Item = &'a str>, candidates: &[&str]) -> Option<usize> {
    let wanted: Vec<String> = candidates.iter().map(|c| squash(c)).collect();
    headers
        .into_iter()
        .position(|h| wanted.contains(&squash(h)))
}

/// Pick the delimiter that occurs most often in the header line.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

/// Split an `id(nickname)` cell. Cells without a parenthesised part are
/// returned as the id alone.
pub fn split_mixed_id(cell: &str) -> (String, Option<String>) {
    let cell = cell.trim().replace('＠', "@");
    match (cell.find('('), cell.find(')')) {
        (Some(open), Some(close)) if open < close => {
            let id = cell[..open].trim().to_string();
            let nick = cell[open + 1..close].trim().to_string();
            (id, (!nick.is_empty()).then_some(nick))
        }
        _ => (cell, None),
    }
}

/// `"1,234"` -> 1234, `"12.9"` -> 12, anything unparsable -> 0.
pub fn parse_hearts(cell: &str) -> u64 {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if let Ok(n) = cleaned.parse::<u64>() {
        return n;
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f.trunc() as u64,
        _ => 0,
    }
}
