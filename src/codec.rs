//! Row <-> file payload codec.
//!
//! A row file's content is one `key=value` line per column, in the
//! database's declared column order, with no trailing newline. Decoding
//! follows the usual properties-file conventions: blank lines and `#`/`!`
//! comment lines are skipped, the first `=` splits key from value, and the
//! last occurrence of a duplicated key wins.
//!
//! Encoding performs no escaping. A value containing `=` or a newline
//! produces a payload that will not round-trip; that is a known limitation
//! of the format, not an encode-time error.

use std::collections::BTreeMap;

/// Encodes a row into its file payload.
///
/// `columns` and `values` are parallel sequences of equal length; the
/// output is byte-deterministic for a given input.
#[must_use]
pub fn encode(columns: &[String], values: &[String]) -> Vec<u8> {
    debug_assert_eq!(columns.len(), values.len());

    let lines: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(col, val)| format!("{col}={val}"))
        .collect();
    lines.join("\n").into_bytes()
}

/// Decodes a file payload into a key -> value mapping.
///
/// Column ordering is not preserved; callers take ordering from the schema.
/// Malformed input is handled leniently: a line with no `=` is a key with
/// an empty value, and anything unrecognisable is simply skipped.
#[must_use]
pub fn decode(payload: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(payload);
    let mut map = BTreeMap::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v),
            None => (line.trim(), ""),
        };
        map.insert(key.to_string(), value.to_string());
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_encode_basic() {
        let payload = encode(&cols(&["id", "name"]), &cols(&["1", "alice"]));
        assert_eq!(payload, b"id=1\nname=alice");
    }

    #[test]
    fn test_encode_no_trailing_newline() {
        let payload = encode(&cols(&["id"]), &cols(&["1"]));
        assert_eq!(payload, b"id=1");
        assert!(!payload.ends_with(b"\n"));
    }

    #[test]
    fn test_encode_empty_value() {
        let payload = encode(&cols(&["id", "note"]), &cols(&["1", ""]));
        assert_eq!(payload, b"id=1\nnote=");
    }

    #[test]
    fn test_encode_preserves_column_order() {
        let payload = encode(&cols(&["z", "a"]), &cols(&["1", "2"]));
        assert_eq!(payload, b"z=1\na=2");
    }

    #[test]
    fn test_decode_basic() {
        let map = decode(b"id=1\nname=alice");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("id").map(String::as_str), Some("1"));
        assert_eq!(map.get("name").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_decode_first_equals_splits() {
        let map = decode(b"formula=a=b+c");
        assert_eq!(map.get("formula").map(String::as_str), Some("a=b+c"));
    }

    #[test]
    fn test_decode_duplicate_last_wins() {
        let map = decode(b"id=1\nid=2");
        assert_eq!(map.get("id").map(String::as_str), Some("2"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_decode_skips_blank_and_comment_lines() {
        let map = decode(b"# header\n\nid=1\n! note\n  \nname=bob");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("id").map(String::as_str), Some("1"));
        assert_eq!(map.get("name").map(String::as_str), Some("bob"));
    }

    #[test]
    fn test_decode_bare_key_is_empty_value() {
        let map = decode(b"flag");
        assert_eq!(map.get("flag").map(String::as_str), Some(""));
    }

    #[test]
    fn test_decode_trims_key_and_crlf() {
        let map = decode(b" id =1\r\nname=alice\r");
        assert_eq!(map.get("id").map(String::as_str), Some("1"));
        assert_eq!(map.get("name").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_decode_tolerates_trailing_newline() {
        // Editors typically append one; it must not introduce a phantom key.
        let map = decode(b"id=1\nname=alice\n");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_round_trip() {
        let columns = cols(&["id", "name", "note"]);
        let values = cols(&["7", "carol", "on leave"]);
        let map = decode(&encode(&columns, &values));
        for (c, v) in columns.iter().zip(&values) {
            assert_eq!(map.get(c), Some(v));
        }
    }
}
