//! Stage 3: heuristic rewrite rules
//!
//! Each rule is a pure text-to-text function. The pipeline applies them in
//! [`DEFAULT_RULES`] order and re-parses after every rule that changed the
//! candidate.

use super::fencing::is_tag_char;

/// A named text rewrite
#[derive(Clone, Copy)]
pub struct RewriteRule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

impl std::fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteRule").field("name", &self.name).finish()
    }
}

pub const DEFAULT_RULES: &[RewriteRule] = &[
    RewriteRule {
        name: "smart_quotes",
        apply: smart_quotes,
    },
    RewriteRule {
        name: "single_quotes",
        apply: single_quotes,
    },
    RewriteRule {
        name: "python_literals",
        apply: python_literals,
    },
    RewriteRule {
        name: "raw_newlines",
        apply: raw_newlines,
    },
    RewriteRule {
        name: "trailing_commas",
        apply: trailing_commas,
    },
    RewriteRule {
        name: "residual_fencing",
        apply: residual_fencing,
    },
];

const LEFT_DOUBLE: char = '\u{201C}';
const RIGHT_DOUBLE: char = '\u{201D}';
const LEFT_SINGLE: char = '\u{2018}';
const RIGHT_SINGLE: char = '\u{2019}';

/// Index just past the double-quoted literal opening at `start`.
fn skip_double_literal(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars.get(from..)?.iter().copied().find(|c| !c.is_whitespace())
}

/// Replace typographic quotes used as delimiters with ASCII ones.
pub fn smart_quotes(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Outside,
        Ascii,
        Smart,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match state {
            State::Outside => match c {
                '"' => {
                    state = State::Ascii;
                    out.push('"');
                }
                LEFT_DOUBLE | RIGHT_DOUBLE => {
                    state = State::Smart;
                    out.push('"');
                }
                LEFT_SINGLE | RIGHT_SINGLE => out.push('\''),
                c => out.push(c),
            },
            State::Ascii | State::Smart if c == '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            State::Ascii => {
                if c == '"' {
                    state = State::Outside;
                }
                out.push(c);
            }
            State::Smart => match c {
                LEFT_DOUBLE | RIGHT_DOUBLE => {
                    state = State::Outside;
                    out.push('"');
                }
                '"' => out.push_str("\\\""),
                c => out.push(c),
            },
        }
    }

    out
}

/// Turn single-quoted string literals into double-quoted ones.
///
/// A `'` only opens a literal in value or key position, and only closes it
/// when followed by a delimiter, so apostrophes in prose survive.
pub fn single_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut last: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = skip_double_literal(&chars, i);
                out.extend(&chars[i..end]);
                last = Some('"');
                i = end;
            }
            '\'' if matches!(last, None | Some('{' | '[' | ',' | ':')) => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    match chars[i] {
                        '\\' if chars.get(i + 1) == Some(&'\'') => {
                            out.push('\'');
                            i += 2;
                        }
                        '\\' => {
                            out.push('\\');
                            if let Some(next) = chars.get(i + 1) {
                                out.push(*next);
                            }
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        '\'' if matches!(
                            next_significant(&chars, i + 1),
                            None | Some(',' | '}' | ']' | ':')
                        ) =>
                        {
                            out.push('"');
                            i += 1;
                            break;
                        }
                        other => {
                            out.push(other);
                            i += 1;
                        }
                    }
                }
                last = Some('"');
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    last = Some(c);
                }
                i += 1;
            }
        }
    }

    out
}

const PYTHON_LITERALS: [(&str, &str); 3] =
    [("True", "true"), ("False", "false"), ("None", "null")];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn word_at(chars: &[char], at: usize, word: &str) -> bool {
    let len = word.chars().count();
    let matches = word
        .chars()
        .enumerate()
        .all(|(k, w)| chars.get(at + k) == Some(&w));
    let before = at == 0 || !is_word_char(chars[at - 1]);
    let after = chars.get(at + len).is_none_or(|c| !is_word_char(*c));
    matches && before && after
}

/// `True`, `False` and `None` outside literals become JSON keywords.
pub fn python_literals(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    'scan: while i < chars.len() {
        if chars[i] == '"' {
            let end = skip_double_literal(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        for (python, json) in PYTHON_LITERALS {
            if word_at(&chars, i, python) {
                out.push_str(json);
                i += python.len();
                continue 'scan;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Escape raw control characters inside double-quoted literals.
pub fn raw_newlines(text: &str) -> String {
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
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }

    out
}

/// Drop commas directly before a closing bracket.
pub fn trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' => {
                let end = skip_double_literal(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            ',' if matches!(next_significant(&chars, i + 1), Some('}' | ']')) => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Cut the payload out of surrounding prose.
///
/// Takes the first fenced block when one exists, otherwise the span from the
/// first `{` or `[` to the last matching closer.
pub fn residual_fencing(text: &str) -> String {
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body = match after.find('\n') {
            Some(nl) if after[..nl].trim().chars().all(is_tag_char) => &after[nl + 1..],
            _ => after,
        };
        let end = body.find("```").unwrap_or(body.len());
        return body[..end].trim().to_string();
    }

    enclosed_payload(text).unwrap_or(text).to_string()
}

fn enclosed_payload(text: &str) -> Option<&str> {
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}
