//! Provider-specific second-pass repairs.
//!
//! Model families fail in recognizable ways: one reliably wraps otherwise
//! valid JSON in conversational text and stray backticks, another reliably
//! truncates long outputs mid-value. The hint is resolved to a variant once,
//! at the call boundary, instead of re-sniffing the provider string at every
//! stage.

use crate::repair::balance_closers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderHint {
    #[default]
    Unknown,
    /// Wrapper family: valid payload buried in chat framing.
    Anthropic,
    /// Truncation family: output cut mid-token at the length limit.
    OpenAi,
    /// Truncation family with a bias toward cutting long arrays.
    Gemini,
}

impl ProviderHint {
    /// Maps a free-form provider or model tag to a hint. Unrecognized tags
    /// degrade to `Unknown`, which skips the provider pass.
    pub fn from_tag(tag: &str) -> Self {
        let t = tag.to_ascii_lowercase();
        if t.contains("claude") || t.contains("anthropic") {
            ProviderHint::Anthropic
        } else if t.contains("gpt") || t.contains("openai") {
            ProviderHint::OpenAi
        } else if t.contains("gemini") || t.contains("google") {
            ProviderHint::Gemini
        } else {
            ProviderHint::Unknown
        }
    }

    /// Applies this provider's known fix to text that every generic stage has
    /// already failed on. `None` means the strategy has nothing to offer.
    pub fn second_pass(&self, text: &str) -> Option<String> {
        match self {
            ProviderHint::Unknown => None,
            ProviderHint::Anthropic => strip_chat_framing(text),
            ProviderHint::OpenAi => reclose_truncated_tail(text),
            ProviderHint::Gemini => drop_partial_last_element(text),
        }
    }
}

/// Drops leading lines until one starts with `{` or `[`, trailing lines after
/// the last one ending with `}` or `]`, and stray backticks in between.
fn strip_chat_framing(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines
        .iter()
        .position(|l| matches!(l.trim_start().chars().next(), Some('{') | Some('[')))?;
    let last = lines
        .iter()
        .rposition(|l| matches!(l.trim_end().chars().last(), Some('}') | Some(']')))
        .unwrap_or(lines.len() - 1);
    if last < first {
        return None;
    }
    let body = lines[first..=last].join("\n").replace('`', "");
    if body == text {
        None
    } else {
        Some(body)
    }
}

/// Scans to the end tracking string state, then re-closes whatever the cut
/// left open: an open string gets its quote, a dangling `key:` gets a `null`
/// sentinel, a dangling comma is dropped, and all open containers are closed.
fn reclose_truncated_tail(text: &str) -> Option<String> {
    let mut in_string = false;
    let mut escape = false;
    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
    }

    let mut out = text.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    let tail = out.trim_end();
    if tail.ends_with(':') {
        out.push_str(" null");
    } else if tail.ends_with(',') {
        out.truncate(out.trim_end().len() - 1);
    }

    let (closed, changed) = balance_closers(&out);
    if !changed && closed == text {
        return None;
    }
    Some(closed)
}

/// Cuts back to the last comma outside any string and closes from there,
/// discarding the partial trailing element of a truncated array.
fn drop_partial_last_element(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut escape = false;
    let mut last_comma: Option<usize> = None;
    for (i, &ch) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            b'"' => in_string = true,
            b',' => last_comma = Some(i),
            _ => {}
        }
    }

    let cut = last_comma?;
    let (closed, _) = balance_closers(&text[..cut]);
    if closed == text {
        None
    } else {
        Some(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn from_tag_matches_model_names() {
        assert_eq!(ProviderHint::from_tag("claude-sonnet-4"), ProviderHint::Anthropic);
        assert_eq!(ProviderHint::from_tag("gpt-4o-mini"), ProviderHint::OpenAi);
        assert_eq!(ProviderHint::from_tag("gemini-1.5-pro"), ProviderHint::Gemini);
        assert_eq!(ProviderHint::from_tag("mystery-model"), ProviderHint::Unknown);
    }

    #[test]
    fn truncated_key_gets_null_sentinel() {
        let fixed = ProviderHint::OpenAi.second_pass(r#"{"a": 1, "b":"#).unwrap();
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["a"], 1);
        assert!(v["b"].is_null());
    }

    #[test]
    fn truncated_string_reclosed() {
        let fixed = ProviderHint::OpenAi.second_pass(r#"{"a": "unfin"#).unwrap();
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["a"], "unfin");
    }

    #[test]
    fn partial_array_element_dropped() {
        let fixed = ProviderHint::Gemini
            .second_pass(r#"{"tags": ["a", "b", "c"#)
            .unwrap();
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn chat_framing_stripped() {
        let text = "Sure, here you go:\n{\"a\": 1}\nAnything else?";
        let fixed = ProviderHint::Anthropic.second_pass(text).unwrap();
        let v: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn unknown_provider_skips() {
        assert_eq!(ProviderHint::Unknown.second_pass("{\"a\": 1"), None);
    }
}
