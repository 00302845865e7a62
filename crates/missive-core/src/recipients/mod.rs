//! RecipientSet loader: ordered recipient table -> `Vec<Recipient>`.
//!
//! The table is CSV-like (delimiter sniffed from the header). Only the
//! identifier column is required; nickname and heart columns are optional
//! and every other column is ignored. Row order is campaign order.

pub mod columns;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::{MissiveError, MissiveResult, Recipient};

pub use self::columns::ColumnMap;
use self::columns::{parse_hearts, sniff_delimiter, split_mixed_id};

/// Load and parse a recipient file.
///
/// A missing file is a configuration problem; an unreadable or
/// identifier-less table is a data problem.
pub fn load_recipients(path: &Path, now: DateTime<Utc>) -> MissiveResult<Vec<Recipient>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MissiveError::Config(format!(
                "recipient file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    let text = String::from_utf8(bytes).map_err(|_| {
        MissiveError::Data(format!("{} is not valid UTF-8", path.display()))
    })?;
    parse_recipients(&text, now)
}

pub fn parse_recipients(text: &str, now: DateTime<Utc>) -> MissiveResult<Vec<Recipient>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let map = ColumnMap::resolve(headers.iter().map(String::as_str)).ok_or_else(|| {
        MissiveError::Data(format!(
            "no identifier column among headers {headers:?}"
        ))
    })?;

    let mut recipients = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let (id, nick_from_id) = split_mixed_id(record.get(map.id).unwrap_or_default());
        let nickname = nick_from_id.or_else(|| {
            map.nickname
                .and_then(|i| record.get(i))
                .map(|s| s.trim().to_string())
        });
        let hearts = map
            .hearts
            .and_then(|i| record.get(i))
            .map(parse_hearts)
            .unwrap_or(0);

        let mut recipient = Recipient::new(index, id, now).with_hearts(hearts);
        if let Some(nickname) = nickname {
            recipient = recipient.with_nickname(nickname);
        }
        recipients.push(recipient);
    }

    tracing::debug!(count = recipients.len(), "recipient table parsed");
    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeliveryStatus;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_rows_in_order() {
        let csv = "후원아이디,닉네임,후원하트\nalpha,알파,\"1,500\"\nbeta,,2000\ngamma,감마,abc\n";
        let rows = parse_recipients(csv, now()).unwrap();

        assert_eq!(rows.len(), 3);
        for (i, r) in rows.iter().enumerate() {
            assert_eq!(r.index, i);
            assert_eq!(r.status, DeliveryStatus::Pending);
        }
        assert_eq!(rows[0].id, "alpha");
        assert_eq!(rows[0].nickname.as_deref(), Some("알파"));
        assert_eq!(rows[0].hearts, 1500);
        assert_eq!(rows[1].nickname, None);
        assert_eq!(rows[1].hearts, 2000);
        assert_eq!(rows[2].hearts, 0);
    }

    #[test]
    fn missing_identifier_column_is_data_error() {
        let err = parse_recipients("닉네임,후원하트\n알파,100\n", now()).unwrap_err();
        assert!(matches!(err, MissiveError::Data(_)));
    }

    #[test]
    fn hearts_column_is_optional() {
        let rows = parse_recipients("id\na\nb\n", now()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.hearts == 0));
    }

    #[test]
    fn blank_identifiers_are_kept_in_place() {
        let rows = parse_recipients("id,hearts\na,1\n  ,2\nc,3\n", now()).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].has_blank_id());
        assert_eq!(rows[2].index, 2);
    }

    #[test]
    fn mixed_cells_override_nickname_column() {
        let csv = "후원 아이디(닉네임),닉네임,하트\npanda01(달빛),다른닉,10\npanda02,보름,20\n";
        let rows = parse_recipients(csv, now()).unwrap();
        assert_eq!(rows[0].id, "panda01");
        assert_eq!(rows[0].nickname.as_deref(), Some("달빛"));
        assert_eq!(rows[1].id, "panda02");
        assert_eq!(rows[1].nickname.as_deref(), Some("보름"));
    }

    #[test]
    fn bom_and_tabs_are_handled() {
        let tsv = "\u{feff}후원아이디\t후원하트\nalpha\t10\n";
        let rows = parse_recipients(tsv, now()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "alpha");
        assert_eq!(rows[0].hearts, 10);
    }

    #[test]
    fn extra_columns_and_short_rows_are_tolerated() {
        let csv = "순번,id,메모,hearts\n1,a,hello,5\n2,b\n";
        let rows = parse_recipients(csv, now()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, "b");
        assert_eq!(rows[1].hearts, 0);
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = load_recipients(&dir.path().join("nope.csv"), now()).unwrap_err();
        assert!(matches!(err, MissiveError::Config(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recipients_preview.csv");
        fs::write(&path, "후원아이디,후원하트\nalpha,1000\n").unwrap();
        let rows = load_recipients(&path, now()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hearts, 1000);
    }
}
