//! Text codec for per-layer metadata.
//!
//! Layer metadata is a small string map stored as one object. It is written
//! as UTF-8 `key=value` lines, sorted by key, so it stays readable with any
//! object-store browser.

use std::collections::BTreeMap;

use bytes::Bytes;

use tile_common::StorageResult;

/// Content type of stored metadata objects.
pub const PROPERTIES_CONTENT_TYPE: &str = "text/plain";

/// Serialize a metadata map.
pub fn encode_properties(properties: &BTreeMap<String, String>) -> Bytes {
    let mut out = String::new();
    for (key, value) in properties {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    Bytes::from(out)
}

/// Parse a metadata object; an empty payload is an empty map.
pub fn decode_properties(data: &[u8]) -> StorageResult<BTreeMap<String, String>> {
    let text = std::str::from_utf8(data)?;
    let mut properties = BTreeMap::new();

    for line in text.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = split_line(line);
        properties.insert(key, value);
    }

    Ok(properties)
}

fn escape_into(out: &mut String, text: &str, is_key: bool) {
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            // Leading '#' or '!' would turn the line into a comment
            '#' | '!' if is_key && i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_whitespace() && (i == 0 || is_key) => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}

/// Split a line into key and value and unescape both.
///
/// The key ends at the first unescaped `=`, `:` or whitespace. Whitespace
/// and at most one separator follow before the value starts.
fn split_line(line: &str) -> (String, String) {
    let mut key = String::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == '=' || c == ':' || c.is_whitespace() {
            break;
        }
        chars.next();
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                key.push(unescape(escaped));
            }
        } else {
            key.push(c);
        }
    }

    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    if chars.next_if(|c| *c == '=' || *c == ':').is_some() {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                value.push(unescape(escaped));
            }
        } else {
            value.push(c);
        }
    }

    (key, value)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        other => other,
    }
}
