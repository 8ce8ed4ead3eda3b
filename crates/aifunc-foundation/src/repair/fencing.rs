//! Stage 1: strip code fences and stray wrapping characters

const FENCE: &str = "```";

pub(super) fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')
}

/// Remove a leading fence (with optional language tag), a trailing fence,
/// and stray backticks or quotes at either end.
///
/// Quotes are only removed when they wrap an object, list or string literal,
/// so a bare JSON string such as `"Rome"` survives.
pub fn strip_fencing(text: &str) -> String {
    let mut s = strip_opening_fence(text.trim()).trim();

    if let Some(inner) = s.strip_suffix(FENCE) {
        s = inner.trim();
    }

    s = s.trim_matches('`').trim();

    for quote in ['"', '\''] {
        let wrapped = s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote);
        if wrapped {
            let inner = s[1..s.len() - 1].trim();
            if inner.starts_with('{') || inner.starts_with('[') || is_string_literal(inner) {
                s = inner;
                break;
            }
        }
    }

    s.to_string()
}

fn is_string_literal(s: &str) -> bool {
    s.starts_with('"') && serde_json::from_str::<String>(s).is_ok()
}

fn strip_opening_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix(FENCE) else {
        return s;
    };
    let tag_len = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
    let after_tag = &rest[tag_len..];
    if tag_len > 0 && !after_tag.is_empty() && !after_tag.starts_with(char::is_whitespace) {
        // what looked like a tag is the payload itself, as in ```42```
        return rest;
    }
    after_tag
}
