//! Custom request headers: header-file loading, layering and masking.
//!
//! Headers come from two layers. The header file is the base layer and
//! `--header` flags are the explicit layer; explicit entries win on a key
//! collision, compared case-insensitively.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::warn;

/// Header name -> value, ordered by name for stable output.
pub type HeaderSet = BTreeMap<String, String>;

const SENSITIVE_KEYS: [&str; 4] = ["authorization", "token", "key", "secret"];
const MASK_VISIBLE_CHARS: usize = 5;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonHeaderValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Other(serde_json::Value),
}

/// Splits `Key: Value` on the first colon. Returns None without a colon or
/// with an empty key.
pub fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.trim().split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Inserts `key`, replacing any entry whose name differs only in ASCII case.
fn insert_header(headers: &mut HeaderSet, key: String, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
    headers.insert(key, value);
}

/// Collects pairs into one layer; a later pair replaces an earlier one with
/// the same case-insensitive name.
pub fn collect_headers<I>(pairs: I) -> HeaderSet
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut headers = HeaderSet::new();
    for (key, value) in pairs {
        insert_header(&mut headers, key, value);
    }
    headers
}

fn parse_json_headers(content: &str) -> Option<HeaderSet> {
    let raw: BTreeMap<String, JsonHeaderValue> = serde_json::from_str(content).ok()?;
    let mut headers = HeaderSet::new();
    for (key, value) in raw {
        let value = match value {
            JsonHeaderValue::Text(text) => text,
            JsonHeaderValue::Number(number) => number.to_string(),
            JsonHeaderValue::Flag(flag) => flag.to_string(),
            JsonHeaderValue::Other(other) => {
                warn!(header = %key, value = %other, "ignoring non-scalar header value");
                continue;
            }
        };
        insert_header(&mut headers, key, value);
    }
    Some(headers)
}

fn parse_line_headers(content: &str) -> HeaderSet {
    collect_headers(content.lines().filter_map(parse_header_line))
}

/// Parses a header file body: a JSON object first, `Key: Value` lines
/// otherwise.
pub fn parse_header_file(content: &str) -> HeaderSet {
    parse_json_headers(content).unwrap_or_else(|| parse_line_headers(content))
}

/// Loads the header file. A missing file is only a warning.
pub async fn load_header_file(path: &Path) -> Result<HeaderSet> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(parse_header_file(&content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!("Header file '{}' not found", path.display());
            Ok(HeaderSet::new())
        }
        Err(err) => {
            Err(err).with_context(|| format!("Failed to read header file: {}", path.display()))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLayers {
    /// From the header file.
    pub base: HeaderSet,
    /// From `--header` flags.
    pub explicit: HeaderSet,
}

impl HeaderLayers {
    pub fn new(base: HeaderSet, explicit: HeaderSet) -> Self {
        Self { base, explicit }
    }

    /// Merges the layers; an explicit key replaces any base key that differs
    /// only in ASCII case.
    pub fn resolve(&self) -> HeaderSet {
        let mut merged: HeaderSet = self
            .base
            .iter()
            .filter(|(key, _)| {
                !self
                    .explicit
                    .keys()
                    .any(|explicit| explicit.eq_ignore_ascii_case(key))
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        merged.extend(self.explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Converts to a reqwest header map, skipping entries that are not valid
/// HTTP header names or values.
pub fn to_header_map(headers: &HeaderSet) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                warn!(header = %key, "skipping invalid header name");
                continue;
            }
        };
        let value = match HeaderValue::from_str(value) {
            Ok(value) => value,
            Err(_) => {
                warn!(header = %key, "skipping invalid header value");
                continue;
            }
        };
        map.insert(name, value);
    }
    map
}

pub fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Masks values of credential-like headers, keeping the first five chars.
pub fn mask_value(key: &str, value: &str) -> String {
    if !is_sensitive(key) {
        return value.to_string();
    }
    let len = value.chars().count();
    if len > MASK_VISIBLE_CHARS {
        let visible: String = value.chars().take(MASK_VISIBLE_CHARS).collect();
        format!("{}{}", visible, "*".repeat(len - MASK_VISIBLE_CHARS))
    } else {
        "*".repeat(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn set(pairs: &[(&str, &str)]) -> HeaderSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn header_line_splits_on_first_colon() {
        assert_eq!(
            parse_header_line("  Referer: https://example.com:8443/x  "),
            Some(("Referer".into(), "https://example.com:8443/x".into()))
        );
        assert_eq!(parse_header_line("NoColon"), None);
        assert_eq!(parse_header_line(": value"), None);
        assert_eq!(parse_header_line("X-Empty:"), Some(("X-Empty".into(), "".into())));
    }

    #[test]
    fn json_and_line_forms_are_equivalent() {
        let json = r#"{
            "X-Bug-Bounty": "hunter123",
            "Authorization": "Bearer token123"
        }"#;
        let lines = "X-Bug-Bounty: hunter123\n\nAuthorization: Bearer token123\n";
        assert_eq!(parse_header_file(json), parse_header_file(lines));
        assert_eq!(
            parse_header_file(json),
            set(&[
                ("Authorization", "Bearer token123"),
                ("X-Bug-Bounty", "hunter123")
            ])
        );
    }

    #[test]
    fn json_scalars_become_text_and_nested_values_are_dropped() {
        let json = r#"{"X-Num": 42, "X-Flag": true, "X-Obj": {"a": 1}, "X-Null": null}"#;
        assert_eq!(
            parse_header_file(json),
            set(&[("X-Flag", "true"), ("X-Num", "42")])
        );
    }

    #[test]
    fn non_object_json_falls_back_to_lines() {
        assert!(parse_header_file(r#"["a", "b"]"#).is_empty());
        assert_eq!(
            parse_header_file("{broken\nX-A: 1"),
            set(&[("X-A", "1")])
        );
    }

    #[tokio::test]
    async fn missing_header_file_is_empty() {
        let dir = tempdir().unwrap();
        let headers = load_header_file(&dir.path().join("none.json")).await.unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn loads_header_file_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("headers.txt");
        std::fs::write(&path, "Cookie: a=b; c=d\n").unwrap();
        let headers = load_header_file(&path).await.unwrap();
        assert_eq!(headers, set(&[("Cookie", "a=b; c=d")]));
    }

    #[test]
    fn explicit_layer_wins_case_insensitively() {
        let layers = HeaderLayers::new(
            set(&[("authorization", "file"), ("X-File-Only", "1")]),
            set(&[("Authorization", "cli"), ("X-Cli-Only", "2")]),
        );
        assert_eq!(
            layers.resolve(),
            set(&[
                ("Authorization", "cli"),
                ("X-Cli-Only", "2"),
                ("X-File-Only", "1")
            ])
        );
    }

    #[test]
    fn case_variants_within_a_layer_collapse_to_the_last() {
        assert_eq!(
            parse_header_file("x-a: 1\nX-A: 2\nX-B: 3\n"),
            set(&[("X-A", "2"), ("X-B", "3")])
        );
        let explicit = collect_headers([
            ("X-A".to_string(), "1".to_string()),
            ("x-a".to_string(), "2".to_string()),
        ]);
        assert_eq!(explicit, set(&[("x-a", "2")]));

        let map = to_header_map(&HeaderLayers::new(HeaderSet::new(), explicit).resolve());
        assert_eq!(map.get("x-a").unwrap(), "2");
    }

    #[test]
    fn header_map_skips_invalid_entries() {
        let map = to_header_map(&set(&[
            ("X-Good", "yes"),
            ("Bad Name", "x"),
            ("X-Bad-Value", "line\nbreak"),
        ]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-good").unwrap(), "yes");
    }

    #[test]
    fn masks_sensitive_values() {
        assert_eq!(mask_value("Authorization", "Bearer abc"), "Beare*****");
        assert_eq!(mask_value("X-Api-Key", "12345"), "*****");
        assert_eq!(mask_value("X-Session-TOKEN", "abcdefg"), "abcde**");
        assert_eq!(mask_value("client_secret", "s"), "*");
        assert_eq!(mask_value("X-Bug-Bounty", "hunter123"), "hunter123");
    }
}
