//! Parsing of JSON text that is still being streamed.
//!
//! A generator emits the target object as raw text in arbitrary fragments.
//! [`parse_partial`] turns any prefix of that text into the largest JSON
//! value it already determines: open strings, arrays and objects are closed,
//! while dangling keys, trailing commas, half-written numbers and literals
//! are dropped. [`merge_monotonic`] folds successive snapshots so that a
//! field, once seen, is never retracted and arrays never shrink.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Expect {
    /// A value (top level, after `:`, after `,` in an array).
    Value,
    /// First element of an array, or `]`.
    ValueOrClose,
    /// First key of an object, or `}`.
    KeyOrClose,
    /// A key after `,` in an object.
    Key,
    Colon,
    /// `,` or the closing bracket of the current container.
    CommaOrClose,
    Done,
}

/// Parse the determined part of a (possibly truncated) JSON document.
///
/// Text before the first `{` or `[` (prose, a Markdown fence) is skipped.
pub fn parse_partial(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    let repaired = repair(&text[start..])?;
    serde_json::from_str(&repaired).ok()
}

/// Extract the complete top-level object from generator output, ignoring
/// surrounding prose or a Markdown code fence.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Cut point where the prefix can be closed into valid JSON.
struct Checkpoint {
    cut: usize,
    suffix: &'static str,
    stack: Vec<u8>,
}

fn repair(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut expect = Expect::Value;
    let mut checkpoint: Option<Checkpoint> = None;
    let mut i = 0;

    let save = |cut: usize, suffix: &'static str, stack: &Vec<u8>| Checkpoint {
        cut,
        suffix,
        stack: stack.clone(),
    };

    while i < bytes.len() {
        let byte = bytes[i];
        if byte.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        match expect {
            Expect::Done => break,
            Expect::Value | Expect::ValueOrClose => {
                if expect == Expect::ValueOrClose && byte == b']' {
                    stack.pop();
                    i += 1;
                    expect = after_value(&stack);
                    checkpoint = Some(save(i, "", &stack));
                    continue;
                }
                match byte {
                    b'{' => {
                        stack.push(b'{');
                        i += 1;
                        expect = Expect::KeyOrClose;
                        checkpoint = Some(save(i, "", &stack));
                    }
                    b'[' => {
                        stack.push(b'[');
                        i += 1;
                        expect = Expect::ValueOrClose;
                        checkpoint = Some(save(i, "", &stack));
                    }
                    b'"' => match scan_string(bytes, i) {
                        StringScan::Closed(end) => {
                            i = end;
                            expect = after_value(&stack);
                            checkpoint = Some(save(i, "", &stack));
                        }
                        StringScan::Open(safe) => {
                            if !stack.is_empty() {
                                checkpoint = Some(save(safe, "\"", &stack));
                            }
                            break;
                        }
                    },
                    b'-' | b'0'..=b'9' => {
                        let end = scan_number(bytes, i);
                        let complete = serde_json::from_str::<serde_json::Number>(
                            &text[i..end],
                        )
                        .is_ok();
                        // A number touching the end of the text may still grow.
                        if end == bytes.len() || !complete {
                            break;
                        }
                        i = end;
                        expect = after_value(&stack);
                        checkpoint = Some(save(i, "", &stack));
                    }
                    b't' | b'f' | b'n' => {
                        let rest = &text[i..];
                        let literal = ["true", "false", "null"]
                            .into_iter()
                            .find(|lit| rest.starts_with(lit));
                        match literal {
                            Some(lit) => {
                                i += lit.len();
                                expect = after_value(&stack);
                                checkpoint = Some(save(i, "", &stack));
                            }
                            None => break,
                        }
                    }
                    _ => break,
                }
            }
            Expect::KeyOrClose | Expect::Key => {
                if expect == Expect::KeyOrClose && byte == b'}' {
                    stack.pop();
                    i += 1;
                    expect = after_value(&stack);
                    checkpoint = Some(save(i, "", &stack));
                    continue;
                }
                if byte != b'"' {
                    break;
                }
                match scan_string(bytes, i) {
                    StringScan::Closed(end) => {
                        i = end;
                        expect = Expect::Colon;
                    }
                    StringScan::Open(_) => break,
                }
            }
            Expect::Colon => {
                if byte != b':' {
                    break;
                }
                i += 1;
                expect = Expect::Value;
            }
            Expect::CommaOrClose => {
                let top = stack.last().copied();
                match (byte, top) {
                    (b',', Some(b'{')) => {
                        i += 1;
                        expect = Expect::Key;
                    }
                    (b',', Some(b'[')) => {
                        i += 1;
                        expect = Expect::Value;
                    }
                    (b'}', Some(b'{')) | (b']', Some(b'[')) => {
                        stack.pop();
                        i += 1;
                        expect = after_value(&stack);
                        checkpoint = Some(save(i, "", &stack));
                    }
                    _ => break,
                }
            }
        }
    }

    let checkpoint = checkpoint?;
    let mut repaired = String::with_capacity(checkpoint.cut + checkpoint.stack.len() + 1);
    repaired.push_str(&text[..checkpoint.cut]);
    repaired.push_str(checkpoint.suffix);
    for open in checkpoint.stack.iter().rev() {
        repaired.push(if *open == b'{' { '}' } else { ']' });
    }
    Some(repaired)
}

fn after_value(stack: &[u8]) -> Expect {
    if stack.is_empty() {
        Expect::Done
    } else {
        Expect::CommaOrClose
    }
}

enum StringScan {
    /// Index just past the closing quote.
    Closed(usize),
    /// Text ends inside the string; index where it can be cut and closed.
    Open(usize),
}

fn scan_string(bytes: &[u8], open_quote: usize) -> StringScan {
    let mut i = open_quote + 1;
    let mut safe = i;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return StringScan::Closed(i + 1),
            b'\\' => {
                let escape_len = match bytes.get(i + 1) {
                    Some(b'u') => 6,
                    Some(_) => 2,
                    None => return StringScan::Open(safe),
                };
                if i + escape_len > bytes.len() {
                    return StringScan::Open(safe);
                }
                i += escape_len;
                safe = i;
            }
            _ => {
                i += 1;
                safe = i;
            }
        }
    }
    StringScan::Open(safe)
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && matches!(bytes[end], b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
    {
        end += 1;
    }
    end
}

/// Fold `next` into `prev` without ever removing what `prev` already holds.
///
/// Objects keep every key seen so far, arrays keep their length and merge
/// element-wise, scalars take the newer value unless it is `null`.
pub fn merge_monotonic(prev: &mut Value, next: Value) {
    match (prev, next) {
        (Value::Object(prev_map), Value::Object(next_map)) => {
            for (key, value) in next_map {
                match prev_map.get_mut(&key) {
                    Some(existing) => merge_monotonic(existing, value),
                    None => {
                        prev_map.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(prev_items), Value::Array(next_items)) => {
            for (idx, value) in next_items.into_iter().enumerate() {
                match prev_items.get_mut(idx) {
                    Some(existing) => merge_monotonic(existing, value),
                    None => prev_items.push(value),
                }
            }
        }
        (_, Value::Null) => {}
        (Value::Object(_), _) | (Value::Array(_), _) => {}
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closes_open_string_and_containers() {
        let value = parse_partial(r#"{"title": "Kyoto: A Jour"#).unwrap();
        assert_eq!(value, json!({ "title": "Kyoto: A Jour" }));
    }

    #[test]
    fn test_drops_dangling_key_and_comma() {
        assert_eq!(
            parse_partial(r#"{"a": 1, "b"#).unwrap(),
            json!({ "a": 1 })
        );
        assert_eq!(parse_partial(r#"{"a": 1,"#).unwrap(), json!({ "a": 1 }));
        assert_eq!(parse_partial(r#"{"a": 1, "b":"#).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn test_nested_arrays_are_closed() {
        let text = r#"{"itinerary": [{"day": 1, "activities": [{"name": "Fushimi"#;
        let value = parse_partial(text).unwrap();
        assert_eq!(
            value,
            json!({ "itinerary": [{ "day": 1, "activities": [{ "name": "Fushimi" }] }] })
        );
    }

    #[test]
    fn test_incomplete_number_and_literal_are_dropped() {
        assert_eq!(parse_partial(r#"{"a": 12"#).unwrap(), json!({}));
        assert_eq!(parse_partial(r#"{"a": 12,"#).unwrap(), json!({ "a": 12 }));
        assert_eq!(parse_partial(r#"{"a": [1, 2"#).unwrap(), json!({ "a": [1] }));
        assert_eq!(parse_partial(r#"{"a": 1.5e"#).unwrap(), json!({}));
        assert_eq!(parse_partial(r#"{"a": -"#).unwrap(), json!({}));
        assert_eq!(parse_partial(r#"{"ok": tr"#).unwrap(), json!({}));
        assert_eq!(parse_partial(r#"{"ok": true"#).unwrap(), json!({ "ok": true }));
    }

    #[test]
    fn test_escape_split_across_fragments() {
        assert_eq!(
            parse_partial(r#"{"a": "say \"#).unwrap(),
            json!({ "a": "say " })
        );
        assert_eq!(
            parse_partial(r#"{"a": "caf\u00"#).unwrap(),
            json!({ "a": "caf" })
        );
    }

    #[test]
    fn test_skips_code_fence_and_prose() {
        let value = parse_partial("```json\n{\"mood\": \"Flexible\"}\n```").unwrap();
        assert_eq!(value, json!({ "mood": "Flexible" }));
        assert!(parse_partial("Sure, here is").is_none());
    }

    #[test]
    fn test_extract_object() {
        assert_eq!(extract_object("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(extract_object("no json"), None);
    }

    #[test]
    fn test_every_prefix_parses_without_panicking() {
        let text = r#"{"a": [1, 2.5, {"b": "x\ny", "c": null}], "d": {"e": false}}"#;
        for end in 1..=text.len() {
            let value = parse_partial(&text[..end]).expect("prefix after `{` always parses");
            assert!(value.is_object());
        }
        assert_eq!(
            parse_partial(text).unwrap(),
            serde_json::from_str::<Value>(text).unwrap()
        );
    }

    #[test]
    fn test_merge_never_retracts() {
        let mut prev = json!({ "a": "kept", "list": [1, 2, 3], "obj": { "x": 1 } });
        merge_monotonic(
            &mut prev,
            json!({ "list": [9], "obj": { "y": 2 }, "b": "new", "a": null }),
        );
        assert_eq!(
            prev,
            json!({ "a": "kept", "list": [9, 2, 3], "obj": { "x": 1, "y": 2 }, "b": "new" })
        );
    }

    #[test]
    fn test_merge_grows_strings() {
        let mut prev = json!({ "title": "Kyo" });
        merge_monotonic(&mut prev, json!({ "title": "Kyoto" }));
        assert_eq!(prev["title"], "Kyoto");
    }
}
