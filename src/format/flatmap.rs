//! Flat `key=value` format for the cache
//!
//! One entry per line. Values pass through [`escape_returns`] so an entry
//! never spans lines; keys are written verbatim and must not contain `=`
//! or line breaks.

use std::collections::HashMap;

use super::escape::{escape_returns, unescape_returns};
use super::DecodeError;

/// Serializes the mapping, one `key=value` line per entry, sorted by key.
pub fn to_flat(entries: &HashMap<String, String>) -> Vec<u8> {
    let mut sorted: Vec<_> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    for (key, value) in sorted {
        out.push_str(key);
        out.push('=');
        out.push_str(&escape_returns(value));
        out.push('\n');
    }

    out.into_bytes()
}

/// Parses `key=value` lines.
///
/// Lines without `=` are skipped. Only the first `=` separates key from
/// value. A later line for the same key wins.
pub fn from_flat(data: &[u8]) -> Result<HashMap<String, String>, DecodeError> {
    let text = std::str::from_utf8(data)?;
    let mut entries = HashMap::new();

    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            entries.insert(key.to_string(), unescape_returns(value));
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn writes_sorted_lines() {
        let entries = map(&[("b", "2"), ("a", "1")]);
        assert_eq!(to_flat(&entries), b"a=1\nb=2\n");
    }

    #[test]
    fn escapes_multiline_values() {
        let entries = map(&[("msg", "line one\nline two\r")]);
        assert_eq!(to_flat(&entries), b"msg=line one\\nline two\\r\n");

        let parsed = from_flat(&to_flat(&entries)).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn splits_on_first_equals_only() {
        let parsed = from_flat(b"url=http://x/?a=b&c=d\n").unwrap();
        assert_eq!(parsed.get("url").unwrap(), "http://x/?a=b&c=d");
    }

    #[test]
    fn skips_lines_without_separator() {
        let parsed = from_flat(b"garbage\n\nkey=value\nmore garbage").unwrap();
        assert_eq!(parsed, map(&[("key", "value")]));
    }

    #[test]
    fn empty_input_is_empty_map() {
        assert!(from_flat(b"").unwrap().is_empty());
    }

    #[test]
    fn empty_value_is_kept() {
        let parsed = from_flat(b"token=\n").unwrap();
        assert_eq!(parsed.get("token").unwrap(), "");
    }

    #[test]
    fn handles_crlf_line_endings() {
        let parsed = from_flat(b"a=1\r\nb=2\r\n").unwrap();
        assert_eq!(parsed, map(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn later_duplicate_wins() {
        let parsed = from_flat(b"k=old\nk=new\n").unwrap();
        assert_eq!(parsed.get("k").unwrap(), "new");
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = from_flat(b"k=\xff\xfe\n").unwrap_err();
        assert!(matches!(err, DecodeError::Utf8(_)));
    }

    proptest! {
        #[test]
        fn round_trip(entries in proptest::collection::hash_map(
            "[a-zA-Z0-9_.-]{1,12}",
            "[^=\\\\\n\r]{0,24}",
            0..16,
        )) {
            prop_assert_eq!(from_flat(&to_flat(&entries)).unwrap(), entries);
        }

        #[test]
        fn round_trip_with_line_breaks(entries in proptest::collection::hash_map(
            "[a-z]{1,8}",
            "[a-z \n\r]{0,24}",
            0..8,
        )) {
            prop_assert_eq!(from_flat(&to_flat(&entries)).unwrap(), entries);
        }
    }
}
