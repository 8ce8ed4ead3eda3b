//! Character sanitization of candidate text
//!
//! Only the inside of double-quoted string literals is touched. Non-ASCII
//! characters and `< > & '` are rewritten to a numeric form so the text that
//! reaches the parser is plain ASCII.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How sensitive characters inside string literals are escaped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizeMode {
    /// `\uXXXX` escapes; the parsed value is unchanged
    #[default]
    JsonUnicode,
    /// `&#NNN;` entities; the parsed value carries the entities
    HtmlEntities,
    Off,
}

fn is_sensitive(c: char) -> bool {
    !c.is_ascii() || matches!(c, '<' | '>' | '&' | '\'')
}

/// Escape sensitive characters occurring inside double-quoted literals.
pub fn sanitize_literal(text: &str, mode: SanitizeMode) -> String {
    if mode == SanitizeMode::Off {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            c if is_sensitive(c) => escape_into(&mut out, c, mode),
            c => out.push(c),
        }
    }

    out
}

fn escape_into(out: &mut String, c: char, mode: SanitizeMode) {
    match mode {
        SanitizeMode::JsonUnicode => {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
        SanitizeMode::HtmlEntities => {
            let _ = write!(out, "&#{};", c as u32);
        }
        SanitizeMode::Off => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn json_unicode_keeps_parsed_value() {
        let raw = r#"{"city": "Zürich <HQ> & 'co'", "emoji": "🦀"}"#;
        let safe = sanitize_literal(raw, SanitizeMode::JsonUnicode);

        assert!(safe.is_ascii());
        assert!(safe.contains(r"\u00fc"));
        assert!(safe.contains(r"\ud83e\udd80"));
        let parsed: Value = serde_json::from_str(&safe).unwrap();
        assert_eq!(parsed, json!({"city": "Zürich <HQ> & 'co'", "emoji": "🦀"}));
    }

    #[test]
    fn html_entities_change_the_value() {
        let safe = sanitize_literal(r#"["a<b"]"#, SanitizeMode::HtmlEntities);
        assert_eq!(safe, r#"["a&#60;b"]"#);
    }

    #[test]
    fn text_outside_literals_is_untouched() {
        let raw = "{'k': \"é\"} <é>";
        let safe = sanitize_literal(raw, SanitizeMode::JsonUnicode);
        assert_eq!(safe, "{'k': \"\\u00e9\"} <é>");
    }

    #[test]
    fn escaped_quotes_do_not_end_the_literal() {
        let safe = sanitize_literal(r#""a\"<""#, SanitizeMode::JsonUnicode);
        assert_eq!(safe, r#""a\"\u003c""#);
    }

    #[test]
    fn off_is_identity() {
        let raw = r#"{"x": "ü"}"#;
        assert_eq!(sanitize_literal(raw, SanitizeMode::Off), raw);
    }
}
