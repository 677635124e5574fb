//! Text config parsers for the patch-server endpoints.
//!
//! Two formats exist side by side: pipe-separated tables with a typed
//! header row (`.build.info`, `/versions`, `/cdns`) and `#`-headed
//! key/value configs (build config, CDN config).

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};

/// A parsed pipe-separated table.
///
/// Header cells are cut at the `!` type marker and stripped of spaces, so
/// `Build Config!HEX:16` becomes `BuildConfig`. Rows shorter than the
/// header truncate; extra cells are dropped.
#[derive(Debug, Clone)]
pub struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn parse(data: &str) -> Result<Self> {
        let mut lines = data
            .lines()
            .map(|l: &str| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty() && !l.starts_with('#'));

        let header_line = lines.next().ok_or(Error::ConfigSyntax("missing header row"))?;
        let headers: Vec<String> = header_line
            .split('|')
            .map(|cell| {
                let name = cell.split('!').next().unwrap_or(cell);
                name.replace(' ', "")
            })
            .collect();

        let rows = lines
            .map(|line| {
                line.split('|')
                    .take(headers.len())
                    .map(str::to_string)
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Field value by header name, or `None` if the column is absent or the
    /// row was truncated before it.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.headers.iter().position(|h| h == name)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// Iterate rows as header → value maps, in file order.
    pub fn records(&self) -> impl Iterator<Item = HashMap<&str, &str>> {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v.as_str()))
                .collect()
        })
    }
}

/// Parse a `#`-headed key/value config into a map.
///
/// Kebab-case keys are normalized to camelCase (`encoding-size` →
/// `encodingSize`) so lookups match across config revisions. Duplicate
/// keys keep the last value.
pub fn parse_kv_config(data: &str) -> Result<HashMap<String, String>> {
    let mut lines = data
        .lines()
        .map(|l: &str| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty());

    match lines.next() {
        Some(first) if first.trim_start().starts_with("# ") => {}
        _ => return Err(Error::ConfigSyntax("config must start with a comment header")),
    }

    let mut entries = HashMap::new();
    for line in lines {
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("unparseable config line: {line:?}");
            return Err(Error::ConfigSyntax("value line without '='"));
        };
        entries.insert(
            normalize_config_key(key.trim()),
            value.trim().to_string(),
        );
    }
    Ok(entries)
}

/// `kebab-case` → `camelCase`. Keys without a dash pass through untouched,
/// which makes the normalization idempotent.
fn normalize_config_key(key: &str) -> String {
    if !key.contains('-') {
        return key.to_string();
    }
    let mut parts = key.split('-');
    let mut out = String::with_capacity(key.len());
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        let mut chars = part.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_headers_cut_at_type_marker() {
        let data = "Region!STRING:0|Build Config!HEX:16|BuildId!DEC:4\n\
                    us|abcd1234|54321\n\
                    eu|ffee0011|54322\n";
        let table = TextTable::parse(data).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "Region"), Some("us"));
        assert_eq!(table.get(1, "BuildConfig"), Some("ffee0011"));
        assert_eq!(table.get(0, "BuildId"), Some("54321"));
        assert_eq!(table.get(0, "Missing"), None);
    }

    #[test]
    fn table_skips_blanks_and_comments() {
        let data = "\n# leading comment\nName!STRING:0|Hosts!STRING:0\n\n\
                    ## seqn = 12345\n\
                    eu|host1.example host2.example\n";
        let table = TextTable::parse(data).unwrap();
        // The seqn line is a comment and must not become a record.
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.get(0, "Hosts"), Some("host1.example host2.example"));
    }

    #[test]
    fn table_truncates_short_rows() {
        let data = "A!STRING:0|B!STRING:0|C!STRING:0\none|two\nx|y|z|extra\n";
        let table = TextTable::parse(data).unwrap();
        assert_eq!(table.get(0, "C"), None);
        assert_eq!(table.get(1, "C"), Some("z"));
    }

    #[test]
    fn kv_config_basic() {
        let map = parse_kv_config("# header\nencoding-key = abcd\nroot=1234\n").unwrap();
        assert_eq!(map.get("encodingKey").map(String::as_str), Some("abcd"));
        assert_eq!(map.get("root").map(String::as_str), Some("1234"));
    }

    #[test]
    fn kv_config_requires_comment_header() {
        assert!(parse_kv_config("root = 1234\n").is_err());
        assert!(parse_kv_config("#no-space\nroot = 1234\n").is_err());
    }

    #[test]
    fn kv_config_duplicate_last_wins() {
        let map = parse_kv_config("# cfg\nroot = 1\nroot = 2\n").unwrap();
        assert_eq!(map.get("root").map(String::as_str), Some("2"));
    }

    #[test]
    fn kv_config_missing_equals_is_fatal() {
        assert!(parse_kv_config("# cfg\njust-some-words\n").is_err());
    }

    #[test]
    fn key_normalization_idempotent() {
        assert_eq!(normalize_config_key("size-in-bytes"), "sizeInBytes");
        assert_eq!(normalize_config_key("sizeInBytes"), "sizeInBytes");
        assert_eq!(normalize_config_key("plain"), "plain");
        assert_eq!(normalize_config_key("trailing-"), "trailing");
    }
}
