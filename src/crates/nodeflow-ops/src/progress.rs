//! Progress operations
//!
//! Bodies run on a blocking worker; every reporter tick surfaces as a
//! `progress` event in the execution trace.

use anyhow::{bail, Result};
use nodeflow_core::registry::{OpInputs, OpLibrary};
use nodeflow_core::ProgressReporter;
use serde_json::{json, Value};

use crate::math::number_value;

/// Tick `ticks` times at even spacing, then return `result`
fn ticker(inputs: OpInputs, progress: &ProgressReporter) -> Result<Value> {
    let ticks = inputs.get("ticks").and_then(Value::as_u64).unwrap_or(10);
    for i in 1..=ticks {
        progress.update(i, ticks, &format!("tick {i} of {ticks}"));
    }
    Ok(inputs.get("result").cloned().unwrap_or(json!(42)))
}

/// Sum a list of numbers, reporting progress per element
fn batch_sum(inputs: OpInputs, progress: &ProgressReporter) -> Result<Value> {
    let Some(values) = inputs.get("values").and_then(Value::as_array) else {
        bail!("missing list input 'values'");
    };
    let total = values.len() as u64;
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        let Some(f) = value.as_f64() else {
            bail!("element {i} is not a number");
        };
        sum += f;
        progress.update(i as u64 + 1, total, &format!("summed {} of {total}", i + 1));
    }
    Ok(number_value(sum))
}

/// Register the pack under the `progress::` namespace
pub fn register(library: &mut OpLibrary) {
    library.register_progress("progress::ticker", ticker);
    library.register_progress("progress::batch_sum", batch_sum);
}
