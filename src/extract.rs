//! Locating a structural candidate inside surrounding prose.

use regex::Regex;
use std::sync::LazyLock;

/// A span of the input that looks like a JSON object or array.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    /// Byte offsets in the original text.
    pub span: (usize, usize),
    /// True when nesting never returned to depth zero before end of input.
    pub truncated: bool,
    pub method: &'static str,
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t')
}

/// Finds the next triple-backtick fence at or after `from`. Returns
/// (inner_start, inner_end, fence_end); an unclosed fence runs to end of text.
fn next_fence(text: &str, from: usize) -> Option<(usize, usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i + 2 < bytes.len() {
        if bytes[i] == b'`' && bytes[i + 1] == b'`' && bytes[i + 2] == b'`' {
            i += 3;
            // optional language tag, e.g. "json" or "JSON"
            while i < bytes.len()
                && !is_ws(bytes[i])
                && bytes[i] != b'{'
                && bytes[i] != b'['
            {
                i += 1;
            }
            while i < bytes.len() && is_ws(bytes[i]) {
                i += 1;
            }
            let inner_start = i;
            while i + 2 < bytes.len() {
                if bytes[i] == b'`' && bytes[i + 1] == b'`' && bytes[i + 2] == b'`' {
                    return Some((inner_start, i, i + 3));
                }
                i += 1;
            }
            return Some((inner_start, bytes.len(), bytes.len()));
        }
        i += 1;
    }
    None
}

/// Returns the inner text of the first fenced code block whose content starts
/// with `{` or `[`. Blocks holding prose or code in other languages are
/// skipped.
pub fn unwrap_markdown(text: &str) -> Option<String> {
    let mut from = 0;
    while let Some((inner_start, inner_end, fence_end)) = next_fence(text, from) {
        let inner = text[inner_start..inner_end].trim();
        if inner.starts_with('{') || inner.starts_with('[') {
            return Some(inner.to_string());
        }
        if fence_end <= from {
            break;
        }
        from = fence_end;
    }
    None
}

/// Cheap span grab when no usable fence exists: first `{` to last `}` (or the
/// bracket pair). Blind to strings, which is why the character scan runs as
/// its own later stage.
pub fn naive_span(text: &str) -> Option<String> {
    static OBJ_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
    static ARR_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

    let obj = OBJ_SPAN_RE.find(text);
    let arr = ARR_SPAN_RE.find(text);
    match (obj, arr) {
        (Some(o), Some(a)) => {
            if o.start() <= a.start() {
                Some(o.as_str().to_string())
            } else {
                Some(a.as_str().to_string())
            }
        }
        (Some(o), None) => Some(o.as_str().to_string()),
        (None, Some(a)) => Some(a.as_str().to_string()),
        (None, None) => None,
    }
}

/// Character scan: begin capture at the first `{` or `[`, track string-literal
/// and escape state so braces inside quoted values are ignored, and stop when
/// nesting returns to zero. A scan that runs off the end is still returned,
/// flagged truncated, so the repair stage can balance it.
pub fn scan_structural(text: &str) -> Option<Extraction> {
    let bytes = text.as_bytes();
    let start_obj = text.find('{');
    let start_arr = text.find('[');
    let start = match (start_obj, start_arr) {
        (None, None) => return None,
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (Some(a), Some(b)) => a.min(b),
    };

    let mut in_string = false;
    let mut escape = false;
    let mut depth: i64 = 0;
    let mut end = bytes.len();
    let mut truncated = true;

    let mut i = start;
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
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth -= 1,
            _ => {}
        }

        if depth == 0 && i > start {
            end = i + 1;
            truncated = false;
            break;
        }
        i += 1;
    }

    Some(Extraction {
        text: text[start..end].to_string(),
        span: (start, end),
        truncated,
        method: "char_scan",
    })
}
