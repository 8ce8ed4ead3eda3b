//! Declarative schema compilation
//!
//! Accepted shapes, by position:
//!
//! - root: an object-map of fields, or a mapping whose `type` is a string or
//!   a list (then the root itself is a field declaration)
//! - field: a type name (`"number"`, `"string[]"`) or a mapping with `type`
//! - `items`: a type name, a field declaration, or an object-map

use super::{ObjectField, SchemaError, SchemaInput, SchemaNode};
use serde_json::{Map, Value};

const ARRAY_SIGIL: &str = "[]";

/// Compile a caller-supplied schema into a [`SchemaNode`].
///
/// Already compiled input is returned unchanged.
pub fn compile(input: SchemaInput) -> Result<SchemaNode, SchemaError> {
    match input {
        SchemaInput::Compiled(node) => Ok(node),
        SchemaInput::Declarative(value) => compile_root(&value),
    }
}

fn compile_root(value: &Value) -> Result<SchemaNode, SchemaError> {
    let path = "$";
    match value {
        Value::String(s) => Err(SchemaError::LegacyShorthand(s.clone())),
        Value::Object(map) if is_field_decl(map) => compile_field_decl(map, path),
        Value::Object(map) => compile_object_map(map, path),
        _ => Err(SchemaError::NotAMapping { path: path.into() }),
    }
}

fn is_field_decl(map: &Map<String, Value>) -> bool {
    matches!(map.get("type"), Some(Value::String(_)) | Some(Value::Array(_)))
}

fn compile_field(value: &Value, path: &str) -> Result<SchemaNode, SchemaError> {
    match value {
        Value::String(name) => compile_type_name(name, None, path),
        Value::Object(map) => {
            if !map.contains_key("type") {
                return Err(SchemaError::MissingType { path: path.into() });
            }
            compile_field_decl(map, path)
        }
        _ => Err(SchemaError::NotAMapping { path: path.into() }),
    }
}

fn compile_items(value: &Value, path: &str) -> Result<SchemaNode, SchemaError> {
    match value {
        Value::String(name) => compile_type_name(name, None, path),
        Value::Object(map) if map.contains_key("type") => compile_field_decl(map, path),
        Value::Object(map) => compile_object_map(map, path),
        other => Err(SchemaError::InvalidItems {
            path: path.into(),
            reason: format!("expected a type name or a mapping, found {}", json_type(other)),
        }),
    }
}

fn compile_field_decl(map: &Map<String, Value>, path: &str) -> Result<SchemaNode, SchemaError> {
    let items = map.get("items");
    let node = match map.get("type") {
        None => return Err(SchemaError::MissingType { path: path.into() }),
        Some(Value::String(name)) => compile_type_name(name, items, path)?,
        Some(Value::Array(alternatives)) => {
            if alternatives.is_empty() {
                return Err(SchemaError::EmptyUnion { path: path.into() });
            }
            let mut nodes = Vec::with_capacity(alternatives.len());
            for alt in alternatives {
                let Value::String(name) = alt else {
                    return Err(SchemaError::InvalidType { path: path.into() });
                };
                nodes.push(compile_type_name(name, items, path)?);
            }
            SchemaNode::union(nodes)
        }
        Some(_) => return Err(SchemaError::InvalidType { path: path.into() }),
    };
    apply_modifiers(node, map, path)
}

fn compile_type_name(
    name: &str,
    items: Option<&Value>,
    path: &str,
) -> Result<SchemaNode, SchemaError> {
    let name = name.trim();
    if let Some(element) = name.strip_suffix(ARRAY_SIGIL) {
        let element = compile_type_name(element, items, &format!("{path}{ARRAY_SIGIL}"))?;
        return Ok(SchemaNode::array(element));
    }

    match name {
        "string" => Ok(SchemaNode::string()),
        "number" => Ok(SchemaNode::number()),
        "boolean" => Ok(SchemaNode::boolean()),
        "date" => Ok(SchemaNode::date()),
        "array" => {
            let items = items.ok_or_else(|| SchemaError::MissingItems {
                path: path.into(),
                kind: "array".into(),
            })?;
            let element = compile_items(items, &format!("{path}{ARRAY_SIGIL}"))?;
            Ok(SchemaNode::array(element))
        }
        "object" => match items {
            Some(Value::Object(fields)) => compile_object_map(fields, path),
            Some(other) => Err(SchemaError::InvalidItems {
                path: path.into(),
                reason: format!("object items must be a mapping of fields, found {}", json_type(other)),
            }),
            None => Err(SchemaError::MissingItems {
                path: path.into(),
                kind: "object".into(),
            }),
        },
        other => Err(SchemaError::UnknownType {
            path: path.into(),
            name: other.to_string(),
        }),
    }
}

fn compile_object_map(map: &Map<String, Value>, path: &str) -> Result<SchemaNode, SchemaError> {
    let mut fields = Vec::with_capacity(map.len());
    for (name, value) in map {
        let schema = compile_field(value, &format!("{path}.{name}"))?;
        fields.push(ObjectField::new(name.clone(), schema));
    }
    Ok(SchemaNode::object(fields))
}

fn apply_modifiers(
    mut node: SchemaNode,
    map: &Map<String, Value>,
    path: &str,
) -> Result<SchemaNode, SchemaError> {
    match map.get("optional") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(b)) => node.optional = *b,
        Some(_) => {
            return Err(SchemaError::InvalidModifier {
                path: path.into(),
                modifier: "optional".into(),
            });
        }
    }

    for key in ["describe", "description"] {
        match map.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => node.description = Some(s.clone()),
            Some(_) => {
                return Err(SchemaError::InvalidModifier {
                    path: path.into(),
                    modifier: key.into(),
                });
            }
        }
    }

    Ok(node)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaKind;
    use serde_json::json;

    fn compile_json(value: Value) -> Result<SchemaNode, SchemaError> {
        compile(SchemaInput::Declarative(value))
    }

    #[test]
    fn bare_scalar_declaration_compiles_to_scalar() {
        assert_eq!(compile_json(json!({"type": "string"})).unwrap(), SchemaNode::string());
        assert_eq!(compile_json(json!({"type": "date"})).unwrap(), SchemaNode::date());
    }

    #[test]
    fn array_with_items_field() {
        let node = compile_json(json!({"type": "array", "items": {"type": "number"}})).unwrap();
        assert_eq!(node, SchemaNode::array(SchemaNode::number()));
    }

    #[test]
    fn array_sigil_is_shorthand_for_array() {
        let node = compile_json(json!({"scores": "number[]"})).unwrap();
        assert_eq!(
            node,
            SchemaNode::object([ObjectField::new("scores", SchemaNode::array(SchemaNode::number()))])
        );

        let nested = compile_json(json!({"type": "string[][]"})).unwrap();
        assert_eq!(
            nested,
            SchemaNode::array(SchemaNode::array(SchemaNode::string()))
        );
    }

    #[test]
    fn object_map_preserves_field_order() {
        let node = compile_json(json!({
            "zeta": {"type": "string"},
            "alpha": {"type": "number"},
            "mid": {"type": "boolean"}
        }))
        .unwrap();

        let SchemaKind::Object(fields) = node.kind else {
            panic!("expected object");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn nested_array_of_objects() {
        let node = compile_json(json!({
            "peoples": {
                "type": "array",
                "items": {
                    "name": {"type": "string", "describe": "full name"},
                    "age": {"type": "number", "optional": true}
                }
            }
        }))
        .unwrap();

        assert_eq!(
            node.signature(),
            r#"{"peoples": list[{"name": str, "age": Optional[float]}]}"#
        );
        assert_eq!(node.field_docs(), vec!["peoples[].name: full name".to_string()]);
    }

    #[test]
    fn object_type_requires_field_map_items() {
        let node = compile_json(json!({
            "type": "object",
            "items": {"city": "string"}
        }))
        .unwrap();
        assert_eq!(
            node,
            SchemaNode::object([ObjectField::new("city", SchemaNode::string())])
        );

        let err = compile_json(json!({"type": "object", "items": "string"})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidItems { .. }));
    }

    #[test]
    fn union_alternatives_honor_their_own_sigil() {
        let node = compile_json(json!({"type": ["string", "number[]"]})).unwrap();
        assert_eq!(
            node,
            SchemaNode::union([
                SchemaNode::string(),
                SchemaNode::array(SchemaNode::number())
            ])
        );
    }

    #[test]
    fn union_array_alternative_shares_items() {
        let node = compile_json(json!({"type": ["string", "array"], "items": "number"})).unwrap();
        assert_eq!(
            node,
            SchemaNode::union([
                SchemaNode::string(),
                SchemaNode::array(SchemaNode::number())
            ])
        );
    }

    #[test]
    fn modifiers_decorate_without_changing_kind() {
        let node = compile_json(json!({
            "type": "number",
            "optional": true,
            "description": "temperature in celsius"
        }))
        .unwrap();
        assert_eq!(node.kind, SchemaKind::Number);
        assert!(node.optional);
        assert_eq!(node.description.as_deref(), Some("temperature in celsius"));
    }

    #[test]
    fn compiled_input_passes_through() {
        let node = SchemaNode::array(SchemaNode::boolean()).describe("flags");
        assert_eq!(compile(SchemaInput::Compiled(node.clone())).unwrap(), node);
    }

    #[test]
    fn legacy_shorthand_is_rejected() {
        let err = compile_json(json!("dict")).unwrap_err();
        assert_eq!(err, SchemaError::LegacyShorthand("dict".into()));
    }

    #[test]
    fn malformed_declarations_report_their_path() {
        assert_eq!(
            compile_json(json!({"name": {"describe": "x"}})).unwrap_err(),
            SchemaError::MissingType { path: "$.name".into() }
        );
        assert_eq!(
            compile_json(json!({"name": "text"})).unwrap_err(),
            SchemaError::UnknownType {
                path: "$.name".into(),
                name: "text".into()
            }
        );
        assert_eq!(
            compile_json(json!({"list": {"type": "array"}})).unwrap_err(),
            SchemaError::MissingItems {
                path: "$.list".into(),
                kind: "array".into()
            }
        );
        assert_eq!(
            compile_json(json!({"type": []})).unwrap_err(),
            SchemaError::EmptyUnion { path: "$".into() }
        );
        assert_eq!(
            compile_json(json!({"type": ["string", 5]})).unwrap_err(),
            SchemaError::InvalidType { path: "$".into() }
        );
        assert_eq!(
            compile_json(json!({"n": {"type": "number", "optional": "yes"}})).unwrap_err(),
            SchemaError::InvalidModifier {
                path: "$.n".into(),
                modifier: "optional".into()
            }
        );
        assert_eq!(
            compile_json(json!({"xs": {"type": "array", "items": {"v": {"type": "nope"}}}}))
                .unwrap_err(),
            SchemaError::UnknownType {
                path: "$.xs[].v".into(),
                name: "nope".into()
            }
        );
        assert_eq!(
            compile_json(json!(42)).unwrap_err(),
            SchemaError::NotAMapping { path: "$".into() }
        );
    }

    #[test]
    fn non_string_type_inside_field_is_invalid() {
        let err = compile_json(json!({"n": {"type": 3}})).unwrap_err();
        assert_eq!(err, SchemaError::InvalidType { path: "$.n".into() });
    }
}
