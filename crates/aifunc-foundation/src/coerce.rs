//! 模式一致性检查与无损类型转换
//! Schema conformance and lossless coercion
//!
//! 将解析后的 JSON 值与编译好的 [`SchemaNode`] 对齐
//! Aligns a parsed JSON value with a compiled [`SchemaNode`]
//!
//! 标量按运行时类型匹配，或者在无损的前提下转换：
//! Scalars match by runtime type, or convert when nothing is lost:
//!
//! | 目标 / Target | 接受 / Accepted |
//! |---------------|-----------------|
//! | `String`      | string, number  |
//! | `Number`      | number, numeric string |
//! | `Boolean`     | boolean, `"true"` / `"false"` in any case |
//! | `Date`        | RFC 3339, `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS` string, returned as written |
//!
//! 联合类型先严格匹配所有备选项，再宽松匹配，因此 `5` 对于
//! `Union[str, float]` 仍然是数字。
//! Unions try every alternative strictly before any lenient pass, so `5`
//! stays a number under `Union[str, float]`.

use aifunc_kernel::schema::{SchemaKind, SchemaNode};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};

/// 标量返回值的载体字段
/// Field of the carrier object wrapping non-object returns
pub const CARRIER_FIELD: &str = "returnData";

/// 一致性检查失败
/// Conformance failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: expected {expected}, found {found}")]
pub struct CoercionError {
    /// 类 JSON Pointer 路径，例如 `$.peoples[1].age`
    /// JSON-pointer-like path, e.g. `$.peoples[1].age`
    pub path: String,
    pub expected: String,
    pub found: String,
}

/// 转换选项
/// Coercion options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoerceOptions {
    /// 拒绝模式中未声明的对象字段
    /// Reject object fields the schema does not declare
    pub deny_unknown_fields: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    Lenient,
}

/// 将值转换为符合模式的形式
/// Coerce a value into schema-conformant form
pub fn coerce(
    value: &Value,
    schema: &SchemaNode,
    options: CoerceOptions,
) -> Result<Value, CoercionError> {
    conform(value, schema, "$", Mode::Lenient, options)
}

/// 先尝试解开载体对象，再尝试整个值
/// Unwrap the carrier object first, then fall back to the whole value
pub fn coerce_with_carrier(
    value: &Value,
    schema: &SchemaNode,
    options: CoerceOptions,
) -> Result<Value, CoercionError> {
    let carried = match value {
        Value::Object(map) if schema.needs_carrier() && map.len() == 1 => map.get(CARRIER_FIELD),
        _ => None,
    };

    match carried {
        Some(inner) => match coerce(inner, schema, options) {
            Ok(v) => Ok(v),
            Err(carrier_err) => coerce(value, schema, options).map_err(|_| carrier_err),
        },
        None => coerce(value, schema, options),
    }
}

fn conform(
    value: &Value,
    node: &SchemaNode,
    path: &str,
    mode: Mode,
    options: CoerceOptions,
) -> Result<Value, CoercionError> {
    if value.is_null() && node.optional {
        return Ok(Value::Null);
    }

    match &node.kind {
        SchemaKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if mode == Mode::Lenient => Ok(Value::String(n.to_string())),
            _ => Err(mismatch(path, node, value)),
        },
        SchemaKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) if mode == Mode::Lenient => {
                parse_number(s).ok_or_else(|| mismatch(path, node, value))
            }
            _ => Err(mismatch(path, node, value)),
        },
        SchemaKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if mode == Mode::Lenient => {
                if s.trim().eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if s.trim().eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(mismatch(path, node, value))
                }
            }
            _ => Err(mismatch(path, node, value)),
        },
        SchemaKind::Date => match value {
            Value::String(s) if is_date(s) => Ok(value.clone()),
            _ => Err(mismatch(path, node, value)),
        },
        SchemaKind::Array(items) => {
            let Value::Array(elements) = value else {
                return Err(mismatch(path, node, value));
            };
            elements
                .iter()
                .enumerate()
                .map(|(i, el)| conform(el, items, &format!("{path}[{i}]"), mode, options))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        SchemaKind::Object(fields) => {
            let Value::Object(map) = value else {
                return Err(mismatch(path, node, value));
            };

            let mut out = Map::new();
            for (key, field_value) in map {
                let field_path = format!("{path}.{key}");
                match fields.iter().find(|f| &f.name == key) {
                    Some(field) => {
                        let v = conform(field_value, &field.schema, &field_path, mode, options)?;
                        out.insert(key.clone(), v);
                    }
                    None if options.deny_unknown_fields => {
                        return Err(CoercionError {
                            path: field_path,
                            expected: "no undeclared field".into(),
                            found: describe(field_value).into(),
                        });
                    }
                    None => {
                        out.insert(key.clone(), field_value.clone());
                    }
                }
            }

            for field in fields {
                if !field.schema.optional && !map.contains_key(&field.name) {
                    return Err(CoercionError {
                        path: format!("{path}.{}", field.name),
                        expected: field.schema.signature(),
                        found: "nothing".into(),
                    });
                }
            }

            Ok(Value::Object(out))
        }
        SchemaKind::Union(alternatives) => {
            for pass in [Mode::Strict, mode] {
                for alt in alternatives {
                    if let Ok(v) = conform(value, alt, path, pass, options) {
                        return Ok(v);
                    }
                }
                if mode == Mode::Strict {
                    break;
                }
            }
            Err(mismatch(path, node, value))
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = s.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(f).map(Value::Number)
}

fn is_date(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
}

fn mismatch(path: &str, node: &SchemaNode, value: &Value) -> CoercionError {
    CoercionError {
        path: path.to_string(),
        expected: node.signature(),
        found: describe(value).into(),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
