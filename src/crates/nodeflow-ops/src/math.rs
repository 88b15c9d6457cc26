//! Arithmetic operations
//!
//! Numeric inputs arrive already coerced to JSON numbers; results that land
//! on an integer render as JSON integers so a graph of ints stays ints on
//! the wire.

use anyhow::{bail, Result};
use nodeflow_core::registry::{OpInputs, OpLibrary};
use serde_json::{json, Value};

/// Integral floats render as JSON integers
pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 9e15 {
        json!(f as i64)
    } else {
        json!(f)
    }
}

pub(crate) fn number(inputs: &OpInputs, key: &str) -> Result<f64> {
    match inputs.get(key).and_then(Value::as_f64) {
        Some(f) => Ok(f),
        None => bail!("missing numeric input '{key}'"),
    }
}

fn add(inputs: OpInputs) -> Result<Value> {
    Ok(number_value(number(&inputs, "a")? + number(&inputs, "b")?))
}

fn subtract(inputs: OpInputs) -> Result<Value> {
    Ok(number_value(number(&inputs, "a")? - number(&inputs, "b")?))
}

fn multiply(inputs: OpInputs) -> Result<Value> {
    Ok(number_value(number(&inputs, "a")? * number(&inputs, "b")?))
}

fn divide(inputs: OpInputs) -> Result<Value> {
    let divisor = number(&inputs, "b")?;
    if divisor == 0.0 {
        bail!("division by zero");
    }
    Ok(number_value(number(&inputs, "a")? / divisor))
}

fn power(inputs: OpInputs) -> Result<Value> {
    Ok(number_value(
        number(&inputs, "base")?.powf(number(&inputs, "exponent")?),
    ))
}

fn round(inputs: OpInputs) -> Result<Value> {
    let value = number(&inputs, "value")?;
    let mode = inputs.get("mode").and_then(Value::as_str).unwrap_or("nearest");
    let rounded = match mode {
        "floor" => value.floor(),
        "ceil" => value.ceil(),
        "nearest" => value.round(),
        other => bail!("unsupported rounding mode '{other}'"),
    };
    Ok(number_value(rounded))
}

/// Register the pack under the `math::` namespace
pub fn register(library: &mut OpLibrary) {
    library.register_plain("math::add", add);
    library.register_plain("math::subtract", subtract);
    library.register_plain("math::multiply", multiply);
    library.register_plain("math::divide", divide);
    library.register_plain("math::power", power);
    library.register_plain("math::round", round);
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
    fn integral_results_stay_integers() {
        let out = add(inputs(&[("a", json!(5)), ("b", json!(3))])).unwrap();
        assert_eq!(out, json!(8));
        let out = divide(inputs(&[("a", json!(7)), ("b", json!(2))])).unwrap();
        assert_eq!(out, json!(3.5));
    }

    #[test]
    fn divide_by_zero_fails() {
        let err = divide(inputs(&[("a", json!(1)), ("b", json!(0))])).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(add(inputs(&[("a", json!(1))])).is_err());
    }

    #[test]
    fn rounding_modes() {
        let v = |mode: &str| {
            round(inputs(&[("value", json!(2.5)), ("mode", json!(mode))])).unwrap()
        };
        assert_eq!(v("floor"), json!(2));
        assert_eq!(v("ceil"), json!(3));
        assert_eq!(v("nearest"), json!(3));
    }

    #[test]
    fn power_defaults_are_supplied_by_schema_not_here() {
        let err = power(inputs(&[("base", json!(2))])).unwrap_err();
        assert!(err.to_string().contains("exponent"));
    }
}
