//! Typed operation schemas
//!
//! A [`FunctionSchema`] is the immutable description of one registered
//! operation: its name, origin file, docstring, kind, parameter list, and
//! return list. Schemas are produced once per registry build (see
//! [`crate::introspect`]) and never mutated afterwards. They parameterize
//! two consumers:
//!
//! - the HTTP schema listing, which clients render as an operation library
//! - the executor's type coercer, which converts raw client values into the
//!   declared parameter types before dispatch
//!
//! # Wire shape
//!
//! A schema serializes as:
//!
//! ```json
//! {
//!   "name": "split_name",
//!   "params": [ { "name": "name", "type": "str" } ],
//!   "returns": [ { "name": "first", "type": "str" },
//!                { "name": "last",  "type": "str" } ],
//!   "docstring": "Split a full name into first and last.",
//!   "filepath": "builtin/ops.yaml",
//!   "is_progress_node": true   // or is_stream_node; absent for plain ops
//! }
//! ```
//!
//! Two or more entries in `returns` mark the multi-key dict contract: the
//! operation must return a mapping carrying every declared key, and each key
//! is an independently addressable output handle downstream.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Declared type of a parameter or return value
///
/// The tag set mirrors what graph editors can author: JSON primitives,
/// containers, opaque image data URLs, enumerated string literals, and an
/// `any` escape hatch that disables coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    Str,
    Bool,
    List,
    Dict,
    Image,
    Literal,
    Any,
}

impl TypeTag {
    /// Parse a manifest type tag; `object` is accepted as an alias of `dict`
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(TypeTag::Int),
            "float" => Some(TypeTag::Float),
            "str" => Some(TypeTag::Str),
            "bool" => Some(TypeTag::Bool),
            "list" => Some(TypeTag::List),
            "dict" | "object" => Some(TypeTag::Dict),
            "image" => Some(TypeTag::Image),
            "literal" => Some(TypeTag::Literal),
            "any" => Some(TypeTag::Any),
            _ => None,
        }
    }

    /// Canonical wire spelling of the tag
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::Bool => "bool",
            TypeTag::List => "list",
            TypeTag::Dict => "dict",
            TypeTag::Image => "image",
            TypeTag::Literal => "literal",
            TypeTag::Any => "any",
        }
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        TypeTag::parse(&tag)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown type tag '{tag}'")))
    }
}

/// The three invocation shapes the executor can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Synchronous call, plain return value
    Plain,
    /// Runs on a worker with a percent/message reporter
    Progress,
    /// Runs on a worker with a text-chunk reporter
    Stream,
}

/// One declared parameter of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Parameter name; doubles as the node's input handle name
    pub name: String,
    /// Declared type tag, drives coercion
    #[serde(rename = "type")]
    pub ty: TypeTag,
    /// Default applied when neither an edge nor node data supplies a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Ordered admissible values; present exactly when `ty` is `literal`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_values: Option<Vec<String>>,
}

/// One declared return of an operation
///
/// Single-return operations use the conventional name `output`. Multi-output
/// operations list one entry per declared key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeTag,
}

/// Immutable description of one registered operation
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSchema {
    /// Operation name, unique within its kind
    pub name: String,
    /// Declared parameters, in manifest order
    pub params: Vec<ParamSchema>,
    /// Declared returns; more than one entry marks the multi-output contract
    pub returns: Vec<ReturnSchema>,
    /// Docstring; empty string when absent
    pub docstring: String,
    /// Filesystem origin of the declaration
    pub filepath: String,
    /// Invocation shape
    pub kind: OpKind,
}

impl FunctionSchema {
    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }

    /// True when the operation declares more than one output key
    pub fn is_multi_output(&self) -> bool {
        self.returns.len() > 1
    }
}

// The kind is flattened into `is_progress_node` / `is_stream_node` flags on
// the wire, emitted only when set.
impl Serialize for FunctionSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.kind != OpKind::Plain);
        let mut state = serializer.serialize_struct("FunctionSchema", 5 + extra)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("params", &self.params)?;
        state.serialize_field("returns", &self.returns)?;
        state.serialize_field("docstring", &self.docstring)?;
        state.serialize_field("filepath", &self.filepath)?;
        match self.kind {
            OpKind::Plain => {}
            OpKind::Progress => state.serialize_field("is_progress_node", &true)?,
            OpKind::Stream => state.serialize_field("is_stream_node", &true)?,
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(kind: OpKind) -> FunctionSchema {
        FunctionSchema {
            name: "demo".into(),
            params: vec![ParamSchema {
                name: "mode".into(),
                ty: TypeTag::Literal,
                default: Some(json!("fast")),
                literal_values: Some(vec!["fast".into(), "slow".into()]),
            }],
            returns: vec![ReturnSchema {
                name: "output".into(),
                ty: TypeTag::Any,
            }],
            docstring: String::new(),
            filepath: "pack/ops.yaml".into(),
            kind,
        }
    }

    #[test]
    fn type_tag_round_trip() {
        for tag in ["int", "float", "str", "bool", "list", "dict", "image", "literal", "any"] {
            let parsed = TypeTag::parse(tag).unwrap();
            assert_eq!(parsed.as_str(), tag);
        }
        assert_eq!(TypeTag::parse("object"), Some(TypeTag::Dict));
        assert_eq!(TypeTag::parse("tuple"), None);
    }

    #[test]
    fn plain_schema_has_no_kind_flags() {
        let value = serde_json::to_value(schema(OpKind::Plain)).unwrap();
        assert!(value.get("is_progress_node").is_none());
        assert!(value.get("is_stream_node").is_none());
        assert_eq!(value["params"][0]["type"], "literal");
        assert_eq!(value["params"][0]["literal_values"], json!(["fast", "slow"]));
    }

    #[test]
    fn kind_flags_serialize_when_set() {
        let progress = serde_json::to_value(schema(OpKind::Progress)).unwrap();
        assert_eq!(progress["is_progress_node"], json!(true));
        assert!(progress.get("is_stream_node").is_none());

        let stream = serde_json::to_value(schema(OpKind::Stream)).unwrap();
        assert_eq!(stream["is_stream_node"], json!(true));
    }

    #[test]
    fn optional_param_fields_are_omitted() {
        let value = serde_json::to_value(ParamSchema {
            name: "a".into(),
            ty: TypeTag::Float,
            default: None,
            literal_values: None,
        })
        .unwrap();
        assert_eq!(value, json!({ "name": "a", "type": "float" }));
    }

    #[test]
    fn multi_output_detection() {
        let mut s = schema(OpKind::Plain);
        assert!(!s.is_multi_output());
        s.returns.push(ReturnSchema {
            name: "rest".into(),
            ty: TypeTag::Str,
        });
        assert!(s.is_multi_output());
    }
}
