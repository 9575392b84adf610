//! Java-properties-syntax parsing for the free-text properties field.
//!
//! Supports the subset the build tool's property files actually use:
//! `key=value` (or `key: value`) lines, `#`/`!` comments, backslash line
//! continuations, and `\n`/`\t`/`\r`/`\\` escapes in values. Pairs come back
//! in file order; duplicate keys are kept (later flags win inside the tool).

/// Parse properties text into ordered key/value pairs.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut lines = text.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        // Fold continuation lines (odd number of trailing backslashes).
        let mut logical = line.to_string();
        while ends_with_odd_backslashes(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_pair(&logical);
        if key.is_empty() {
            continue;
        }
        pairs.push((unescape(key), unescape(value)));
    }

    pairs
}

fn ends_with_odd_backslashes(s: &str) -> bool {
    s.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=` or `:` separator.
fn split_pair(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                return (line[..i].trim(), line[i + c.len_utf8()..].trim_start());
            }
            _ => {}
        }
    }
    (line.trim(), "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
