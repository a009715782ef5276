//! Small helpers shared by the store and the form pipeline.
//!
//! - [`timestamp_now`]: sortable local timestamps for fact metadata
//! - [`word_count`]: the word metric every budget in this crate is expressed in
//! - [`to_spaced_json`]: canonical JSON used to price structured units
//! - [`extract_json_object`]: pull the first JSON object out of model output

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;

/// Format used for `created_at` / `last_updated`. Sorts lexicographically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Current local time as `YYYY-MM-DD HH:MM:SS.mmm`.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Serialize `value` with `", "` between elements and `": "` after keys,
/// escaping non-ASCII characters.
///
/// Word costs of structured units are measured over this layout, so a field
/// like `{"id": "email", "type": "text"}` costs four words rather than one.
pub fn to_spaced_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    // Formatter only ever emits ASCII.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Word cost of a structured unit under [`to_spaced_json`].
///
/// Serialization of the crate's own types cannot fail; if a foreign type does
/// fail, it is priced at zero and logged.
pub fn json_word_cost<T: Serialize + ?Sized>(value: &T) -> usize {
    match to_spaced_json(value) {
        Ok(text) => word_count(&text),
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize unit for word costing");
            0
        }
    }
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Return the first well-formed JSON object found in `text`.
///
/// The whole input is tried first; after that every `{` is tried as the start
/// of an object, so prose or code fences around the object are tolerated.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for (start, _) in trimmed.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }

    tracing::debug!(len = text.len(), "no JSON object found in response");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = timestamp_now();
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn timestamps_sort_chronologically() {
        let a = timestamp_now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = timestamp_now();
        assert!(a < b);
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one two\tthree\nfour"), 4);
    }

    #[test]
    fn spaced_json_layout() {
        let value = json!({"id": "email", "tags": [1, 2]});
        assert_eq!(
            to_spaced_json(&value).unwrap(),
            r#"{"id": "email", "tags": [1, 2]}"#
        );
    }

    #[test]
    fn spaced_json_escapes_non_ascii() {
        let value = json!({"name": "café\u{a0}bar"});
        let text = to_spaced_json(&value).unwrap();
        assert_eq!(text, r#"{"name": "caf\u00e9\u00a0bar"}"#);
        assert_eq!(word_count(&text), 2);
    }

    #[test]
    fn spaced_json_escapes_astral_as_surrogates() {
        let text = to_spaced_json("😀").unwrap();
        assert_eq!(text, r#""\ud83d\ude00""#);
    }

    #[test]
    fn json_word_cost_of_field() {
        let field = json!({"id": "email", "type": "text"});
        assert_eq!(json_word_cost(&field), 4);
    }

    #[test]
    fn extract_plain_object() {
        let value = extract_json_object(r#"{"merge_decision": true}"#).unwrap();
        assert_eq!(value["merge_decision"], true);
    }

    #[test]
    fn extract_object_wrapped_in_prose_and_fences() {
        let raw = "Sure! Here is my answer:\n```json\n{\"a\": {\"b\": 1}}\n```\nHope that helps.";
        let value = extract_json_object(raw).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn extract_skips_broken_leading_braces() {
        let raw = "{not json} then {\"ok\": 1}";
        assert_eq!(extract_json_object(raw).unwrap(), json!({"ok": 1}));
    }

    #[test]
    fn extract_rejects_non_objects() {
        assert!(extract_json_object("not valid json").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("").is_none());
    }
}
