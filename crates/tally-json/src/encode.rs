//! Deterministic serializer for [`Json`].
//!
//! Compact output separates entries with `", "` and keys with `": "`.
//! Indented output puts one entry per line with two-space indentation.
//! Object keys are always emitted in sorted order.

use std::fmt::Write as _;

use crate::value::Json;

impl Json {
    /// Serialize to text, optionally indented.
    pub fn to_json(&self, indent: bool) -> String {
        let mut out = String::new();
        self.write_json(&mut out, indent, "");
        out
    }

    /// Indented form, used for files on disk.
    pub fn to_json_pretty(&self) -> String {
        self.to_json(true)
    }

    fn write_json(&self, out: &mut String, indent: bool, prefix: &str) {
        match self {
            Self::String(s) => write_string(out, s),
            Self::Number(n) => out.push_str(n.as_str()),
            Self::True => out.push_str("true"),
            Self::False => out.push_str("false"),
            Self::Null => out.push_str("null"),
            Self::Array(items) => {
                if items.is_empty() {
                    out.push_str("[]");
                    return;
                }
                let child_prefix = format!("{prefix}  ");
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    separator(out, indent, i == 0, &child_prefix);
                    item.write_json(out, indent, &child_prefix);
                }
                close(out, indent, prefix, ']');
            }
            Self::Object(map) => {
                if map.is_empty() {
                    out.push_str("{}");
                    return;
                }
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();

                let child_prefix = format!("{prefix}  ");
                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    separator(out, indent, i == 0, &child_prefix);
                    write_string(out, key);
                    out.push_str(": ");
                    map[key].write_json(out, indent, &child_prefix);
                }
                close(out, indent, prefix, '}');
            }
        }
    }
}

fn separator(out: &mut String, indent: bool, first: bool, child_prefix: &str) {
    match (first, indent) {
        (true, true) => out.push('\n'),
        (true, false) => {}
        (false, true) => out.push_str(",\n"),
        (false, false) => out.push_str(", "),
    }
    if indent {
        out.push_str(child_prefix);
    }
}

fn close(out: &mut String, indent: bool, prefix: &str, bracket: char) {
    if indent {
        out.push('\n');
        out.push_str(prefix);
    }
    out.push(bracket);
}

/// Append `s` as a quoted JSON string literal.
pub fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Quote `s` as a JSON string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_string(&mut out, s);
    out
}
