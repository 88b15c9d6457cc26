//! String operations, including the multi-output `split_name`

use anyhow::{bail, Result};
use nodeflow_core::registry::{OpInputs, OpLibrary};
use serde_json::{json, Value};

fn text(inputs: &OpInputs, key: &str) -> Result<String> {
    match inputs.get(key).and_then(Value::as_str) {
        Some(s) => Ok(s.to_string()),
        None => bail!("missing text input '{key}'"),
    }
}

fn optional_text(inputs: &OpInputs, key: &str) -> String {
    inputs
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn concat(inputs: OpInputs) -> Result<Value> {
    let separator = optional_text(&inputs, "separator");
    let a = optional_text(&inputs, "a");
    let b = optional_text(&inputs, "b");
    Ok(json!(format!("{a}{separator}{b}")))
}

fn uppercase(inputs: OpInputs) -> Result<Value> {
    Ok(json!(text(&inputs, "text")?.to_uppercase()))
}

fn lowercase(inputs: OpInputs) -> Result<Value> {
    Ok(json!(text(&inputs, "text")?.to_lowercase()))
}

fn word_count(inputs: OpInputs) -> Result<Value> {
    Ok(json!(text(&inputs, "text")?.split_whitespace().count()))
}

/// Multi-output: every declared key must be present in the returned mapping
fn split_name(inputs: OpInputs) -> Result<Value> {
    let name = text(&inputs, "name")?;
    let trimmed = name.trim();
    let (first, last) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    Ok(json!({ "first": first, "last": last.trim_start() }))
}

fn join(inputs: OpInputs) -> Result<Value> {
    let separator = optional_text(&inputs, "separator");
    let Some(parts) = inputs.get("parts").and_then(Value::as_array) else {
        bail!("missing list input 'parts'");
    };
    let rendered: Vec<String> = parts
        .iter()
        .map(|part| match part {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    Ok(json!(rendered.join(&separator)))
}

/// Register the pack under the `text::` namespace
pub fn register(library: &mut OpLibrary) {
    library.register_plain("text::concat", concat);
    library.register_plain("text::uppercase", uppercase);
    library.register_plain("text::lowercase", lowercase);
    library.register_plain("text::word_count", word_count);
    library.register_plain("text::split_name", split_name);
    library.register_plain("text::join", join);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, Value)]) -> OpInputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn split_name_produces_both_keys() {
        let out = split_name(inputs(&[("name", json!("Ada Lovelace"))])).unwrap();
        assert_eq!(out, json!({ "first": "Ada", "last": "Lovelace" }));
    }

    #[test]
    fn split_name_without_a_space_leaves_last_empty() {
        let out = split_name(inputs(&[("name", json!("Plato"))])).unwrap();
        assert_eq!(out, json!({ "first": "Plato", "last": "" }));
    }

    #[test]
    fn concat_with_separator() {
        let out = concat(inputs(&[
            ("a", json!("left")),
            ("b", json!("right")),
            ("separator", json!("-")),
        ]))
        .unwrap();
        assert_eq!(out, json!("left-right"));
    }

    #[test]
    fn join_renders_non_strings() {
        let out = join(inputs(&[
            ("parts", json!(["a", 1, true])),
            ("separator", json!(", ")),
        ]))
        .unwrap();
        assert_eq!(out, json!("a, 1, true"));
    }

    #[test]
    fn word_count_counts_whitespace_separated() {
        let out = word_count(inputs(&[("text", json!("  one two\tthree "))])).unwrap();
        assert_eq!(out, json!(3));
    }
}
