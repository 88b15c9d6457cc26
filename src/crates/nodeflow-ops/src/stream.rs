//! Stream operations
//!
//! Bodies run on a blocking worker; every emitted chunk surfaces as a
//! `streaming` event carrying the chunk and the text accumulated so far.
//! The final return value is the operation's `completed` output.

use anyhow::{bail, Result};
use nodeflow_core::registry::{OpInputs, OpLibrary};
use nodeflow_core::StreamReporter;
use serde_json::{json, Value};

fn text(inputs: &OpInputs, key: &str) -> Result<String> {
    match inputs.get(key).and_then(Value::as_str) {
        Some(s) => Ok(s.to_string()),
        None => bail!("missing text input '{key}'"),
    }
}

/// Emit the text one character at a time, then return it whole
fn spell(inputs: OpInputs, stream: &StreamReporter) -> Result<Value> {
    let text = text(&inputs, "text")?;
    let mut buffer = [0u8; 4];
    for ch in text.chars() {
        stream.emit(ch.encode_utf8(&mut buffer));
    }
    Ok(json!(text))
}

/// Emit the text in fixed-size character chunks
fn chunked_echo(inputs: OpInputs, stream: &StreamReporter) -> Result<Value> {
    let text = text(&inputs, "text")?;
    let size = inputs
        .get("chunk_size")
        .and_then(Value::as_u64)
        .unwrap_or(3)
        .max(1) as usize;
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(size) {
        stream.emit(&chunk.iter().collect::<String>());
    }
    Ok(json!(text))
}

/// Register the pack under the `stream::` namespace
pub fn register(library: &mut OpLibrary) {
    library.register_stream("stream::spell", spell);
    library.register_stream("stream::chunked_echo", chunked_echo);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn inputs(pairs: &[(&str, Value)]) -> OpInputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn recording_reporter() -> (StreamReporter, Arc<Mutex<Vec<String>>>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let reporter = StreamReporter::with_sink(move |chunk| {
            sink_seen.lock().unwrap().push(chunk.to_string());
        });
        (reporter, seen)
    }

    #[test]
    fn spell_emits_every_character() {
        let (reporter, seen) = recording_reporter();
        let out = spell(inputs(&[("text", json!("héllo"))]), &reporter).unwrap();
        assert_eq!(out, json!("héllo"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["h", "é", "l", "l", "o"]
        );
    }

    #[test]
    fn chunked_echo_respects_chunk_size() {
        let (reporter, seen) = recording_reporter();
        chunked_echo(
            inputs(&[("text", json!("Hello World")), ("chunk_size", json!(4))]),
            &reporter,
        )
        .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["Hell", "o Wo", "rld"]);
    }

    #[test]
    fn empty_text_emits_nothing() {
        let (reporter, seen) = recording_reporter();
        let out = spell(inputs(&[("text", json!(""))]), &reporter).unwrap();
        assert_eq!(out, json!(""));
        assert!(seen.lock().unwrap().is_empty());
    }
}
