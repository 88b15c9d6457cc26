//! Type coercion between raw client values and declared parameter types
//!
//! Graph editors submit parameter values as strings or JSON-decoded
//! primitives; operations declare what they actually accept. [`coerce`]
//! bridges the two using the parameter's [`TypeTag`]:
//!
//! | tag | already typed | string source | other sources |
//! |---|---|---|---|
//! | `int` | pass | parse (fractional strings truncate) | float truncates; bool rejected |
//! | `float` | pass | parse | int widens; bool rejected |
//! | `str` | pass | n/a | numbers/bools via display, containers as JSON |
//! | `bool` | pass | `"true"`/`"false"`, case-insensitive | number != 0 |
//! | `list` | pass | JSON parse, must be array | rejected |
//! | `dict` | pass | JSON parse, must be object | rejected |
//! | `literal` | n/a | must be an admissible value | rejected |
//! | `image` | opaque string passes | n/a | rejected |
//! | `any` | pass | pass | pass |
//!
//! A boolean source is never routed through the integer conversion, even
//! though the bit pattern would admit it. Null never coerces (except under
//! `any`): a failed upstream node publishes null, so its consumers surface
//! coercion errors of their own instead of silently computing on garbage.
//!
//! Coercion failure is a node-level error, not a schema or registry error;
//! the executor records it and the rest of the graph continues.

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::schema::{ParamSchema, TypeTag};

/// Coerce one raw value to a parameter's declared type
pub fn coerce(param: &ParamSchema, value: Value) -> Result<Value> {
    if matches!(param.ty, TypeTag::Any) {
        return Ok(value);
    }
    if value.is_null() {
        return Err(GraphError::coercion(
            &param.name,
            format!("null cannot take type '{}'", param.ty.as_str()),
        ));
    }
    match param.ty {
        TypeTag::Int => coerce_int(param, value),
        TypeTag::Float => coerce_float(param, value),
        TypeTag::Str => Ok(Value::String(render_string(&value))),
        TypeTag::Bool => coerce_bool(param, value),
        TypeTag::List => coerce_container(param, value, true),
        TypeTag::Dict => coerce_container(param, value, false),
        TypeTag::Literal => coerce_literal(param, value),
        TypeTag::Image => match value {
            Value::String(_) => Ok(value),
            other => Err(type_error(param, "an image data URL string", &other)),
        },
        TypeTag::Any => unreachable!("handled above"),
    }
}

fn coerce_int(param: &ParamSchema, value: Value) -> Result<Value> {
    match value {
        Value::Number(ref n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f.trunc() as i64))
            } else {
                Err(type_error(param, "an integer", &value))
            }
        }
        Value::String(ref s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Value::from(i))
            } else if let Ok(f) = trimmed.parse::<f64>() {
                Ok(Value::from(f.trunc() as i64))
            } else {
                Err(GraphError::coercion(
                    &param.name,
                    format!("'{s}' is not an integer"),
                ))
            }
        }
        // Booleans are not integers here, whatever the bit pattern says.
        other => Err(type_error(param, "an integer", &other)),
    }
}

fn coerce_float(param: &ParamSchema, value: Value) -> Result<Value> {
    match value {
        Value::Number(ref n) => match n.as_f64() {
            Some(f) => Ok(Value::from(f)),
            None => Err(type_error(param, "a number", &value)),
        },
        Value::String(ref s) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(Value::from(f)),
            Err(_) => Err(GraphError::coercion(
                &param.name,
                format!("'{s}' is not a number"),
            )),
        },
        other => Err(type_error(param, "a number", &other)),
    }
}

fn coerce_bool(param: &ParamSchema, value: Value) -> Result<Value> {
    match value {
        Value::Bool(_) => Ok(value),
        Value::Number(ref n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(GraphError::coercion(
                &param.name,
                format!("'{s}' is not a boolean"),
            )),
        },
        other => Err(type_error(param, "a boolean", &other)),
    }
}

fn coerce_container(param: &ParamSchema, value: Value, want_list: bool) -> Result<Value> {
    let expected = if want_list { "a list" } else { "an object" };
    match value {
        Value::Array(_) if want_list => Ok(value),
        Value::Object(_) if !want_list => Ok(value),
        Value::String(ref s) => {
            let parsed: Value = serde_json::from_str(s).map_err(|e| {
                GraphError::coercion(&param.name, format!("invalid JSON: {e}"))
            })?;
            match (&parsed, want_list) {
                (Value::Array(_), true) | (Value::Object(_), false) => Ok(parsed),
                _ => Err(GraphError::coercion(
                    &param.name,
                    format!("JSON value is not {expected}"),
                )),
            }
        }
        other => Err(type_error(param, expected, &other)),
    }
}

fn coerce_literal(param: &ParamSchema, value: Value) -> Result<Value> {
    let Value::String(ref s) = value else {
        return Err(type_error(param, "a literal string", &value));
    };
    let admissible = param.literal_values.as_deref().unwrap_or(&[]);
    if admissible.iter().any(|v| v == s) {
        Ok(value)
    } else {
        Err(GraphError::coercion(
            &param.name,
            format!("'{s}' is not one of {admissible:?}"),
        ))
    }
}

fn render_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Containers render as compact JSON.
        other => other.to_string(),
    }
}

fn type_error(param: &ParamSchema, expected: &str, got: &Value) -> GraphError {
    GraphError::coercion(
        &param.name,
        format!("expected {expected}, got {}", kind_name(got)),
    )
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
