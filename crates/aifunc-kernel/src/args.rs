//! Argument normalization
//!
//! Turns whatever a caller passed as `args` into a keyed mapping and renders
//! the two strings the prompt needs: the call-site argument listing
//! (`a=1, b="x"`) and the parameter signature (`a: int, b: str`).

use serde_json::{Map, Value};

/// Key used when a single scalar is passed.
pub const SCALAR_KEY: &str = "s";

/// Key of the sentinel produced for absent arguments.
pub const SENTINEL_KEY: &str = "start";

/// Canonical form of a call's arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArgs {
    /// Keyed arguments, in input order
    pub args: Map<String, Value>,
    /// `key=value` pairs joined by `", "`
    pub args_string: String,
    /// `key: type` pairs joined by `", "`
    pub param_signature: String,
}

/// Normalize raw arguments.
///
/// - a list is keyed by position: `a`, `b`, ..., `z`, `aa`, `ab`, ...
/// - a mapping passes through unchanged
/// - `null` becomes the `{start: true}` sentinel
/// - any other scalar is wrapped as `{s: value}`
pub fn normalize(raw: &Value) -> NormalizedArgs {
    let args = match raw {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (positional_key(i), v.clone()))
            .collect(),
        Value::Object(map) => map.clone(),
        Value::Null => {
            let mut map = Map::new();
            map.insert(SENTINEL_KEY.to_string(), Value::Bool(true));
            map
        }
        scalar => {
            let mut map = Map::new();
            map.insert(SCALAR_KEY.to_string(), scalar.clone());
            map
        }
    };

    let args_string = args
        .iter()
        .map(|(k, v)| format!("{k}={}", render_value(v)))
        .collect::<Vec<_>>()
        .join(", ");
    let param_signature = args
        .iter()
        .map(|(k, v)| format!("{k}: {}", infer_type(v)))
        .collect::<Vec<_>>()
        .join(", ");

    NormalizedArgs {
        args,
        args_string,
        param_signature,
    }
}

/// Letter key for a positional argument.
pub fn positional_key(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let unified = s.replace("\r\n", "\n").replace('\r', "\n");
            Value::String(unified).to_string()
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Python type name used in the parameter signature.
pub fn infer_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "Any",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            let integral = n.is_i64()
                || n.is_u64()
                || n.as_f64().is_some_and(|f| f.fract() == 0.0);
            if integral {
                "int"
            } else {
                "float"
            }
        }
        Value::String(s) => {
            if s.trim().parse::<f64>().is_ok_and(f64::is_finite) {
                "float"
            } else {
                "str"
            }
        }
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
