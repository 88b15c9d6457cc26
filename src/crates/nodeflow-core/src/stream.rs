//! Execute-to-event-stream driver
//!
//! Bridges the executor's sink-based narration into a consumable stream:
//! the executor runs on a spawned task writing into a bounded channel, and
//! the caller reads [`ExecutionEvent`]s off the returned stream as they
//! happen. The driver guarantees the protocol's terminal framing:
//!
//! - on success the final item is exactly one `done` carrying the view
//!   result map;
//! - on structural failure (cycle, bad reference) the stream consists of
//!   the node events emitted so far (none, for pre-flight failures)
//!   followed by exactly one global `error`;
//! - nothing follows the terminal item; the channel closes with it.
//!
//! Per-node `error` events pass through without terminating the stream.
//!
//! Dropping the stream does not cancel the execution: the task keeps
//! running to completion and its remaining events are discarded, which is
//! the contract for a disconnecting SSE client.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::event::{ChannelSink, ExecutionEvent};
use crate::executor::Executor;
use crate::graph::Graph;
use crate::registry::Registry;

/// Default depth of the event channel between executor and consumer
const EVENT_CHANNEL_DEPTH: usize = 64;

/// Run `graph` on a background task, yielding its events as a stream
pub fn stream_execution(registry: Arc<Registry>, graph: Graph) -> ReceiverStream<ExecutionEvent> {
    stream_execution_guarded(registry, graph, ())
}

/// Like [`stream_execution`], holding `guard` until the execution finishes
///
/// The guard is dropped on the executor task after the terminal event is
/// sent, whatever happens to the consuming stream. The server threads its
/// env-var gate through here so the gate outlives a disconnecting client.
pub fn stream_execution_guarded<G: Send + 'static>(
    registry: Arc<Registry>,
    graph: Graph,
    guard: G,
) -> ReceiverStream<ExecutionEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
    tokio::spawn(async move {
        let _guard = guard;
        let executor = Executor::new(registry);
        let sink = ChannelSink::new(tx.clone());
        let terminal = match executor.execute(&graph, &sink).await {
            Ok(results) => ExecutionEvent::Done { results },
            Err(err) => ExecutionEvent::global_error(err.to_string()),
        };
        debug!(status = terminal.status(), "execution finished");
        let _ = tx.send(terminal).await;
    });
    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{OpInputs, Registry};
    use crate::schema::{FunctionSchema, OpKind, ReturnSchema, TypeTag};
    use serde_json::{json, Value};
    use tokio_stream::StreamExt;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .register_plain(
                FunctionSchema {
                    name: "one".into(),
                    params: vec![],
                    returns: vec![ReturnSchema {
                        name: "output".into(),
                        ty: TypeTag::Int,
                    }],
                    docstring: String::new(),
                    filepath: "test".into(),
                    kind: OpKind::Plain,
                },
                Arc::new(|_: OpInputs| -> anyhow::Result<Value> { Ok(json!(1)) }),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn stream_ends_with_done() {
        let graph: Graph = serde_json::from_value(json!({
            "nodes": [
                { "id": "n", "type": "function", "data": { "functionName": "one" } },
                { "id": "v", "type": "view" }
            ],
            "edges": [ { "source": "n", "target": "v", "targetHandle": "input" } ]
        }))
        .unwrap();

        let events: Vec<_> = stream_execution(registry(), graph).collect().await;
        let last = events.last().unwrap();
        assert!(matches!(last, ExecutionEvent::Done { results } if results["v"] == json!(1)));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn cycle_yields_exactly_one_global_error_frame() {
        let graph: Graph = serde_json::from_value(json!({
            "nodes": [
                { "id": "a", "type": "function", "data": { "functionName": "one" } },
                { "id": "b", "type": "function", "data": { "functionName": "one" } }
            ],
            "edges": [
                { "source": "a", "target": "b", "targetHandle": "x" },
                { "source": "b", "target": "a", "targetHandle": "x" }
            ]
        }))
        .unwrap();

        let events: Vec<_> = stream_execution(registry(), graph).collect().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            ExecutionEvent::Error { node_id, error, .. } => {
                assert!(node_id.is_none());
                assert!(error.contains("cycle"));
            }
            other => panic!("expected global error, got {other:?}"),
        }
    }
}
