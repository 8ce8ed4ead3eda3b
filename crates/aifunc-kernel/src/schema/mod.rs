//! Return-type schema model
//!
//! A [`SchemaNode`] describes the value a function call must produce. Nodes
//! are built either from Rust with the builder constructors below, or from a
//! declarative JSON/YAML tree through [`compile`].
//!
//! ```rust,ignore
//! use aifunc_kernel::schema::{SchemaNode, ObjectField};
//!
//! let person = SchemaNode::object([
//!     ObjectField::new("name", SchemaNode::string()),
//!     ObjectField::new("age", SchemaNode::number().optional()),
//! ]);
//! let schema = SchemaNode::object([ObjectField::new("peoples", SchemaNode::array(person))]);
//!
//! assert_eq!(
//!     schema.signature(),
//!     r#"{"peoples": list[{"name": str, "age": Optional[float]}]}"#
//! );
//! ```

mod compile;

pub use compile::compile;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Closed set of value shapes a schema can describe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Boolean,
    /// A string holding an RFC 3339 timestamp or a `YYYY-MM-DD` date
    Date,
    Array(Box<SchemaNode>),
    Object(Vec<ObjectField>),
    /// Ordered alternatives; the first structural match wins
    Union(Vec<SchemaNode>),
}

/// Named field of an object schema. Field order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectField {
    pub name: String,
    pub schema: SchemaNode,
}

impl ObjectField {
    pub fn new(name: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// One node of a compiled return schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: SchemaKind,
    /// Absence (or `null`) is permitted
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    /// Documentation hint for the model, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            optional: false,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    pub fn number() -> Self {
        Self::new(SchemaKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(SchemaKind::Date)
    }

    pub fn array(items: SchemaNode) -> Self {
        Self::new(SchemaKind::Array(Box::new(items)))
    }

    pub fn object(fields: impl IntoIterator<Item = ObjectField>) -> Self {
        Self::new(SchemaKind::Object(fields.into_iter().collect()))
    }

    pub fn union(alternatives: impl IntoIterator<Item = SchemaNode>) -> Self {
        Self::new(SchemaKind::Union(alternatives.into_iter().collect()))
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::String | SchemaKind::Number | SchemaKind::Boolean | SchemaKind::Date
        )
    }

    /// Whether the model is asked to wrap its answer in the carrier object.
    /// Only object roots are requested bare.
    pub fn needs_carrier(&self) -> bool {
        !matches!(self.kind, SchemaKind::Object(_))
    }

    /// Python-style return annotation used in the prompt.
    pub fn signature(&self) -> String {
        let inner = match &self.kind {
            SchemaKind::String => "str".to_string(),
            SchemaKind::Number => "float".to_string(),
            SchemaKind::Boolean => "bool".to_string(),
            SchemaKind::Date => "date".to_string(),
            SchemaKind::Array(items) => format!("list[{}]", items.signature()),
            SchemaKind::Object(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|f| format!("\"{}\": {}", f.name, f.schema.signature()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            SchemaKind::Union(alts) => {
                let parts: Vec<String> = alts.iter().map(SchemaNode::signature).collect();
                format!("Union[{}]", parts.join(", "))
            }
        };
        if self.optional {
            format!("Optional[{inner}]")
        } else {
            inner
        }
    }

    /// JSON skeleton of a conforming value.
    pub fn example(&self) -> Value {
        match &self.kind {
            SchemaKind::String => Value::String("string".into()),
            SchemaKind::Number => Value::from(0),
            SchemaKind::Boolean => Value::Bool(false),
            SchemaKind::Date => Value::String("2024-01-01".into()),
            SchemaKind::Array(items) => Value::Array(vec![items.example()]),
            SchemaKind::Object(fields) => {
                let mut map = Map::new();
                for f in fields {
                    map.insert(f.name.clone(), f.schema.example());
                }
                Value::Object(map)
            }
            SchemaKind::Union(alts) => alts.first().map(SchemaNode::example).unwrap_or(Value::Null),
        }
    }

    /// `label: description` lines for every described node, depth first.
    /// The root is labelled `return`.
    pub fn field_docs(&self) -> Vec<String> {
        let mut docs = Vec::new();
        self.collect_docs("return", &mut docs);
        docs
    }

    fn collect_docs(&self, label: &str, docs: &mut Vec<String>) {
        if let Some(desc) = &self.description {
            docs.push(format!("{label}: {desc}"));
        }
        match &self.kind {
            SchemaKind::Array(items) => items.collect_docs(&format!("{label}[]"), docs),
            SchemaKind::Object(fields) => {
                for f in fields {
                    let child = if label == "return" {
                        f.name.clone()
                    } else {
                        format!("{label}.{}", f.name)
                    };
                    f.schema.collect_docs(&child, docs);
                }
            }
            SchemaKind::Union(alts) => {
                for alt in alts {
                    alt.collect_docs(label, docs);
                }
            }
            _ => {}
        }
    }
}

/// A return schema as supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaInput {
    /// Declarative tree, compiled on use
    Declarative(Value),
    /// Already compiled; passes through [`compile`] unchanged
    Compiled(SchemaNode),
}

impl From<SchemaNode> for SchemaInput {
    fn from(node: SchemaNode) -> Self {
        Self::Compiled(node)
    }
}

impl From<Value> for SchemaInput {
    fn from(value: Value) -> Self {
        Self::Declarative(value)
    }
}

// Definition files only ever carry declarative trees.
impl<'de> Deserialize<'de> for SchemaInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(SchemaInput::Declarative)
    }
}

impl Serialize for SchemaInput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Declarative(value) => value.serialize(serializer),
            Self::Compiled(node) => node.serialize(serializer),
        }
    }
}

/// Malformed declarative schema. `path` locates the offending node, `$` being
/// the root and `[]` an array element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("legacy shorthand return type {0:?} is not supported; declare a schema instead")]
    LegacyShorthand(String),
    #[error("{path}: missing `type`")]
    MissingType { path: String },
    #[error("{path}: unknown type {name:?}")]
    UnknownType { path: String, name: String },
    #[error("{path}: `type` must be a type name or a list of type names")]
    InvalidType { path: String },
    #[error("{path}: `{kind}` requires `items`")]
    MissingItems { path: String, kind: String },
    #[error("{path}: invalid `items`: {reason}")]
    InvalidItems { path: String, reason: String },
    #[error("{path}: union type list is empty")]
    EmptyUnion { path: String },
    #[error("{path}: modifier `{modifier}` has the wrong type")]
    InvalidModifier { path: String, modifier: String },
    #[error("{path}: expected a mapping or a type name")]
    NotAMapping { path: String },
}
