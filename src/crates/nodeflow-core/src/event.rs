//! Execution events and the sink they flow through
//!
//! Every state transition a node makes while a graph runs is narrated as an
//! [`ExecutionEvent`]. Events have a process-wide monotone ordering per
//! execution: a node's events appear in the order they occurred on its
//! worker, and a node's `completed`/`error` precedes any event of any
//! successor. The terminal frame of a run is exactly one `done` (carrying
//! the view result map) or one global `error`.
//!
//! # Frame grammar
//!
//! Serialized with a `status` discriminator, matching the SSE payloads
//! clients consume:
//!
//! | status | additional fields |
//! |---|---|
//! | `executing` | `node_id`, `node_number`, `node_name`, `inputs` |
//! | `progress` | as above, plus `progress` (0..1), `progress_message` |
//! | `streaming` | as above, plus `streaming_text`, `streaming_chunk` |
//! | `completed` | as `executing`, plus `output` |
//! | `error` (per-node) | as `executing`, plus `error` |
//! | `done` (terminal) | `results` |
//! | `error` (global, terminal) | `error` only; node fields absent |
//!
//! Per-node and global errors share the `error` status; a frame with no
//! `node_id` is the terminal, global form.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// One narrated step of an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionEvent {
    /// A node was dispatched with its resolved inputs
    Executing {
        node_id: String,
        node_number: usize,
        node_name: String,
        inputs: Value,
    },
    /// A progress operation ticked
    Progress {
        node_id: String,
        node_number: usize,
        node_name: String,
        inputs: Value,
        /// Fraction in `[0, 1]`
        progress: f64,
        progress_message: String,
    },
    /// A stream operation produced a chunk
    Streaming {
        node_id: String,
        node_number: usize,
        node_name: String,
        inputs: Value,
        /// Text accumulated so far, including the latest chunk
        streaming_text: String,
        streaming_chunk: String,
    },
    /// A node reached its terminal `COMPLETED` state
    Completed {
        node_id: String,
        node_number: usize,
        node_name: String,
        inputs: Value,
        output: Value,
    },
    /// A node failed, or (with node fields absent) the whole execution
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_number: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inputs: Option<Value>,
        error: String,
    },
    /// Terminal frame carrying the view result map
    Done { results: Map<String, Value> },
}

impl ExecutionEvent {
    /// The terminal global error frame
    pub fn global_error(message: impl Into<String>) -> Self {
        ExecutionEvent::Error {
            node_id: None,
            node_number: None,
            node_name: None,
            inputs: None,
            error: message.into(),
        }
    }

    /// Wire value of the `status` discriminator
    pub fn status(&self) -> &'static str {
        match self {
            ExecutionEvent::Executing { .. } => "executing",
            ExecutionEvent::Progress { .. } => "progress",
            ExecutionEvent::Streaming { .. } => "streaming",
            ExecutionEvent::Completed { .. } => "completed",
            ExecutionEvent::Error { .. } => "error",
            ExecutionEvent::Done { .. } => "done",
        }
    }

    /// True for the two frames that end a stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionEvent::Done { .. } | ExecutionEvent::Error { node_id: None, .. }
        )
    }
}

/// Where the executor writes its events
///
/// The executor is generic over the sink so the same run loop serves the
/// SSE endpoint (channel-backed), the sync endpoint (null), and tests
/// (collecting).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ExecutionEvent);
}

/// Sink forwarding events into a bounded channel
///
/// A send error means the receiver is gone (client disconnected); events
/// are then dropped on the floor while the execution runs to completion.
pub struct ChannelSink {
    tx: mpsc::Sender<ExecutionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ExecutionEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: ExecutionEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// Sink that discards everything; used by the synchronous endpoint
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _event: ExecutionEvent) {}
}

/// Sink that records every event in order; used by tests
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<ExecutionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut *self.events.lock().expect("sink lock"))
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: ExecutionEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}
