//! Textual normalization applied when extraction alone does not yield valid
//! JSON. Every pass is a string/escape-aware scanner so repairs never touch
//! the inside of quoted values (except where that is the point, e.g. escaping
//! raw control characters).

/// Result of a normalization run: the rewritten text plus the names of the
/// fixes that actually fired, for the recovery trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub text: String,
    pub fixes: Vec<&'static str>,
}

/// Strips non-printable characters. Outside strings runs of spaces and tabs
/// collapse to one space; newlines survive untouched everywhere because the
/// per-line quote fix later depends on the original line structure. Inside
/// strings raw tabs become `\t` and carriage returns and other control bytes
/// are dropped.
fn strip_control_chars(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut in_string = false;
    let mut escape = false;
    let mut pending_space = false;
    for ch in text.chars() {
        if in_string {
            if escape {
                escape = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escape = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push('\n'),
                '\t' => {
                    out.push_str("\\t");
                    changed = true;
                }
                '\r' => changed = true,
                c if c.is_control() => changed = true,
                c => out.push(c),
            }
            continue;
        }

        match ch {
            '"' => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                in_string = true;
                out.push(ch);
            }
            ' ' | '\t' => {
                if pending_space || ch == '\t' {
                    changed = true;
                }
                pending_space = true;
            }
            '\n' => {
                pending_space = false;
                out.push('\n');
            }
            '\r' => changed = true,
            c if c.is_control() => changed = true,
            c => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
            }
        }
    }
    (out, changed)
}

/// U+201C/U+201D and U+2018/U+2019 show up when a model writes prose-style
/// quotes around what it meant as JSON strings.
fn fix_smart_quotes(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    for ch in text.chars() {
        match ch {
            '\u{201C}' | '\u{201D}' => {
                out.push('"');
                changed = true;
            }
            '\u{2018}' | '\u{2019}' => {
                out.push('\'');
                changed = true;
            }
            _ => out.push(ch),
        }
    }
    (out, changed)
}

fn strip_comments(text: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut changed = false;
    let mut i: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
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

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                i += 1;
            }
            changed = true;
            continue;
        }

        if ch == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
            changed = true;
            continue;
        }

        out.push(ch);
        i += 1;
    }
    (String::from_utf8_lossy(&out).into_owned(), changed)
}

/// `True`/`False`/`None`/`undefined` outside strings become JSON literals.
fn map_word_literals(text: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut changed = false;
    let mut i: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
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

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            let start = i;
            i += 1;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &text[start..i];
            let mapped = match word {
                "True" => Some("true"),
                "False" => Some("false"),
                "None" => Some("null"),
                "undefined" => Some("null"),
                _ => None,
            };
            if let Some(m) = mapped {
                out.extend_from_slice(m.as_bytes());
                changed = true;
            } else {
                out.extend_from_slice(word.as_bytes());
            }
            continue;
        }

        out.push(ch);
        i += 1;
    }
    (String::from_utf8_lossy(&out).into_owned(), changed)
}

/// Converts single-quoted string literals to double-quoted ones. Double quotes
/// that appear inside a single-quoted literal are escaped on the way through;
/// escaped single quotes (`\'`) become plain apostrophes.
fn fix_single_quotes(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut in_double = false;
    let mut in_single = false;
    let mut escape = false;
    for ch in text.chars() {
        if escape {
            escape = false;
            if ch == '\'' {
                // \' is not a valid JSON escape anywhere; drop the backslash
                out.pop();
                out.push('\'');
                changed = true;
            } else {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '\\' => {
                escape = true;
                out.push(ch);
            }
            '"' if in_single => {
                out.push_str("\\\"");
                changed = true;
            }
            '"' => {
                in_double = !in_double;
                out.push(ch);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push('"');
                changed = true;
            }
            _ => out.push(ch),
        }
    }
    (out, changed)
}

/// Quotes bare object keys: `{key: ...}` and `, key: ...` become `"key":`.
/// Scanner-based like the neighboring passes, so a `, word:` sequence inside
/// a quoted value is left alone.
fn quote_bare_keys(text: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 8);
    let mut changed = false;
    let mut i: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
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

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch == b'{' || ch == b',' {
            out.push(ch);
            i += 1;
            let mark = i;
            while i < bytes.len() && matches!(bytes[i], b' ' | b'\n' | b'\r' | b'\t') {
                i += 1;
            }
            let key_start = i;
            if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
            }
            let key_end = i;
            let mut j = i;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\n' | b'\r' | b'\t') {
                j += 1;
            }
            if key_end > key_start && j < bytes.len() && bytes[j] == b':' {
                out.extend_from_slice(&bytes[mark..key_start]);
                out.push(b'"');
                out.extend_from_slice(&bytes[key_start..key_end]);
                out.push(b'"');
                out.push(b':');
                changed = true;
                i = j + 1;
            } else {
                out.extend_from_slice(&bytes[mark..i]);
            }
            continue;
        }

        out.push(ch);
        i += 1;
    }
    (String::from_utf8_lossy(&out).into_owned(), changed)
}

/// A line holding an odd number of unescaped double quotes has an unterminated
/// string; close it at the line end, before any trailing comma so the comma
/// stays structural.
fn close_unterminated_lines(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut first = true;
    for line in text.split('\n') {
        if !first {
            out.push('\n');
        }
        first = false;

        let mut quotes = 0usize;
        let mut escape = false;
        for ch in line.chars() {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => quotes += 1,
                _ => {}
            }
        }
        if quotes % 2 == 1 {
            let trimmed = line.trim_end();
            if trimmed.ends_with(',') {
                let cut = trimmed.len() - 1;
                out.push_str(&trimmed[..cut]);
                out.push('"');
                out.push(',');
            } else {
                out.push_str(line);
                out.push('"');
            }
            changed = true;
        } else {
            out.push_str(line);
        }
    }
    (out, changed)
}

fn remove_trailing_commas(text: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut changed = false;
    let mut i: usize = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
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

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch == b',' {
            let mut j = i + 1;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\n' | b'\r' | b'\t') {
                j += 1;
            }
            if j >= bytes.len() || bytes[j] == b'}' || bytes[j] == b']' {
                changed = true;
                i += 1;
                continue;
            }
        }

        out.push(ch);
        i += 1;
    }
    (String::from_utf8_lossy(&out).into_owned(), changed)
}

/// Appends the deficit of closers. Closers never exceed openers here; excess
/// closers are a shape the strict parse rejects and salvage inherits.
pub fn balance_closers(text: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut escape = false;
    let mut open: Vec<u8> = Vec::new();
    let mut i: usize = 0;
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
            b'{' | b'[' => open.push(ch),
            b'}' => {
                if open.last() == Some(&b'{') {
                    open.pop();
                }
            }
            b']' => {
                if open.last() == Some(&b'[') {
                    open.pop();
                }
            }
            _ => {}
        }
        i += 1;
    }

    if !in_string && open.is_empty() {
        return (text.to_string(), false);
    }

    let mut out = text.to_string();
    if in_string {
        out.push('"');
    }
    while let Some(opener) = open.pop() {
        out.push(if opener == b'{' { '}' } else { ']' });
    }
    (out, true)
}

/// Runs the full normalization sequence. Order matters: quote shape has to be
/// settled before bare keys are quoted, and line-level string closing has to
/// run before commas and closers are reconsidered.
pub fn normalize(input: &str) -> Normalized {
    let mut text = input.to_string();
    let mut fixes: Vec<&'static str> = Vec::new();

    let passes: [(&'static str, fn(&str) -> (String, bool)); 8] = [
        ("strip_control_chars", strip_control_chars),
        ("fix_smart_quotes", fix_smart_quotes),
        ("strip_comments", strip_comments),
        ("map_word_literals", map_word_literals),
        ("fix_single_quotes", fix_single_quotes),
        ("quote_bare_keys", quote_bare_keys),
        ("close_unterminated_lines", close_unterminated_lines),
        ("remove_trailing_commas", remove_trailing_commas),
    ];

    for (name, pass) in passes {
        let (next, changed) = pass(&text);
        if changed {
            text = next;
            fixes.push(name);
        }
    }

    let (next, changed) = balance_closers(&text);
    if changed {
        text = next;
        fixes.push("balance_closers");
    }

    Normalized { text, fixes }
}
