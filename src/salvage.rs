//! Last-resort extraction of `key: value` shapes by regex.
//!
//! This stage runs only when every structural parse has failed. It can invent
//! plausible-but-wrong structure, which is exactly why it sits at the bottom
//! of the cascade and never earlier.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::types::WrapKeyPolicy;

static NESTED_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([A-Za-z_][A-Za-z0-9_ .-]*)["']\s*:\s*\{"#).unwrap());
static ARRAY_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([A-Za-z_][A-Za-z0-9_ .-]*)["']\s*:\s*\[([^\[\]]*)\]"#).unwrap());
static STRING_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([A-Za-z_][A-Za-z0-9_ .-]*)["']\s*:\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static SCALAR_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["']([A-Za-z_][A-Za-z0-9_ .-]*)["']\s*:\s*(-?[0-9]+(?:\.[0-9]+)?|true|false|null)"#)
        .unwrap()
});

/// Finds the byte offset one past the `}` matching the `{` at `open`, string
/// and escape aware. `None` when the object never closes.
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut in_string = false;
    let mut escape = false;
    let mut depth: i64 = 0;
    let mut i = open;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match ch {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Blanks a byte range so later regex passes cannot re-match inside it. Range
/// endpoints land on ASCII structural characters, so UTF-8 stays intact.
fn mask(buf: &mut [u8], start: usize, end: usize) {
    for b in buf.iter_mut().take(end).skip(start) {
        *b = b' ';
    }
}

fn scalar_from_str(raw: &str) -> Value {
    let item = raw.trim();
    let unquoted = item
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if item.starts_with('"') || item.starts_with('\'') {
        return Value::String(unquoted.to_string());
    }
    if let Ok(n) = item.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = item.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match item {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(unquoted.to_string()),
    }
}

fn insert_new(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !map.contains_key(key) {
        map.insert(key.to_string(), value);
    }
}

/// Pulls whatever `key: value` pairs can be matched out of `text`. Nested
/// `"key": { ... }` spans are salvaged recursively down to `max_depth`, then
/// masked out so their members do not leak into the parent map. Returns an
/// empty map when nothing matches.
pub fn salvage_pairs(text: &str, max_depth: usize) -> Map<String, Value> {
    let mut map = Map::new();
    let mut work = text.as_bytes().to_vec();

    // Nested objects first; their spans must not feed the flat passes.
    let mut consumed_until = 0usize;
    for caps in NESTED_OBJECT_RE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        if whole.start() < consumed_until {
            continue;
        }
        let open = whole.end() - 1;
        let Some(close) = matching_close(text.as_bytes(), open) else {
            continue;
        };
        if max_depth == 0 {
            tracing::warn!(key = %&caps[1], "salvage recursion depth exceeded, skipping nested object");
            mask(&mut work, whole.start(), close);
            consumed_until = close;
            continue;
        }
        let inner = &text[open + 1..close - 1];
        let nested = salvage_pairs(inner, max_depth - 1);
        insert_new(&mut map, &caps[1], Value::Object(nested));
        mask(&mut work, whole.start(), close);
        consumed_until = close;
    }

    let masked = String::from_utf8_lossy(&work).into_owned();

    let mut array_spans: Vec<(usize, usize)> = Vec::new();
    for caps in ARRAY_PAIR_RE.captures_iter(&masked) {
        let whole = caps.get(0).unwrap();
        array_spans.push((whole.start(), whole.end()));
        let items: Vec<Value> = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(scalar_from_str)
            .collect();
        insert_new(&mut map, &caps[1], Value::Array(items));
    }
    for (s, e) in array_spans {
        mask(&mut work, s, e);
    }
    let masked = String::from_utf8_lossy(&work).into_owned();

    for caps in STRING_PAIR_RE.captures_iter(&masked) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        insert_new(&mut map, &caps[1], Value::String(value.to_string()));
    }

    for caps in SCALAR_PAIR_RE.captures_iter(&masked) {
        let value = scalar_from_str(&caps[2]);
        insert_new(&mut map, &caps[1], value);
    }

    map
}

/// Salvage entry point: a map of matched pairs, or the whole text wrapped
/// under the policy's key so the caller always receives something that still
/// references the original output.
pub fn salvage_or_wrap(text: &str, policy: &WrapKeyPolicy, max_depth: usize) -> Value {
    let pairs = salvage_pairs(text, max_depth);
    if !pairs.is_empty() {
        return Value::Object(pairs);
    }
    let mut map = Map::new();
    map.insert(policy.key_for(text), Value::String(text.to_string()));
    Value::Object(map)
}
