//! Dependency-ordered graph execution
//!
//! The [`Executor`] runs one submitted [`Graph`] to completion: it validates
//! structure, computes the Kahn ordering, then dispatches nodes one at a
//! time to the runner matching their kind. Nodes run strictly sequentially:
//! the design privileges a deterministic event trace over wall-clock
//! efficiency, so independent nodes are never parallelized.
//!
//! # Per-node state machine
//!
//! ```text
//! PENDING ──dispatch──▶ EXECUTING ──┬──────────────▶ COMPLETED
//!                          │        │ reporter tick
//!                          │        ├──▶ PROGRESS ──┘   (progress kind)
//!                          │        └──▶ STREAMING ─┘   (stream kind)
//!                          │
//!                          └── coercion / operation failure ──▶ ERROR
//! ```
//!
//! `COMPLETED` and `ERROR` are absorbing. A failed node publishes null; its
//! consumers see the null input and typically fail coercion themselves.
//! Per-node errors are recorded and emitted, never re-raised, and the graph
//! continues. Only structural failures (cycle, bad reference) abort before
//! any node runs.
//!
//! # Workers and reporters
//!
//! Progress and stream operation bodies run on a dedicated blocking worker.
//! A bounded channel connects the worker's reporter to the executor's event
//! pump: the pump is the single reader, the reporter the single writer, and
//! the worker is joined before the node reaches a terminal state, so a
//! node's events always appear in the order its body produced them.
//!
//! # Output ownership
//!
//! The output table (node id → produced value) is owned exclusively by the
//! executor for the duration of one call and discarded afterwards. View
//! nodes additionally copy their input into the view result map returned to
//! the caller.
//!
//! # Environment variables
//!
//! When the graph carries an env-var map it is applied process-wide before
//! the first node and restored after the last, error paths included, via a
//! scope guard. Process env is global state: callers that accept concurrent
//! executions must serialize them around this window (the server does, see
//! its execution gate).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, warn};

use crate::coerce::coerce;
use crate::error::{GraphError, Result};
use crate::event::{EventSink, ExecutionEvent};
use crate::graph::{Edge, Graph, Node, NodeKind};
use crate::registry::{OpInputs, ProgressOp, Registry, StreamOp};
use crate::reporter::{ProgressReporter, StreamReporter};
use crate::schema::FunctionSchema;

/// Value published by a completed node
enum NodeOutput {
    /// Ordinary single-output value (null after a failure)
    Single(Value),
    /// Handle-indexed mapping from a multi-output operation
    Multi(Map<String, Value>),
}

/// Data blob of a variable node
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariableData {
    #[serde(rename = "type", default)]
    var_type: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    llm_message_format: bool,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    text_content_format: bool,
}

/// Data blob of a function node: the operation name plus raw param values
#[derive(Debug, Deserialize)]
struct FunctionData {
    #[serde(rename = "functionName")]
    function_name: String,
    #[serde(flatten)]
    values: Map<String, Value>,
}

/// Event context for one dispatched node
struct EventCtx {
    node_id: String,
    node_number: usize,
    node_name: String,
    inputs: Value,
}

impl EventCtx {
    fn new(node_id: &str, node_number: usize, node_name: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            node_number,
            node_name: node_name.to_string(),
            inputs: json!({}),
        }
    }

    fn executing(&self) -> ExecutionEvent {
        ExecutionEvent::Executing {
            node_id: self.node_id.clone(),
            node_number: self.node_number,
            node_name: self.node_name.clone(),
            inputs: self.inputs.clone(),
        }
    }

    fn progress(&self, progress: f64, message: &str) -> ExecutionEvent {
        ExecutionEvent::Progress {
            node_id: self.node_id.clone(),
            node_number: self.node_number,
            node_name: self.node_name.clone(),
            inputs: self.inputs.clone(),
            progress,
            progress_message: message.to_string(),
        }
    }

    fn streaming(&self, text: &str, chunk: &str) -> ExecutionEvent {
        ExecutionEvent::Streaming {
            node_id: self.node_id.clone(),
            node_number: self.node_number,
            node_name: self.node_name.clone(),
            inputs: self.inputs.clone(),
            streaming_text: text.to_string(),
            streaming_chunk: chunk.to_string(),
        }
    }

    fn completed(&self, output: Value) -> ExecutionEvent {
        ExecutionEvent::Completed {
            node_id: self.node_id.clone(),
            node_number: self.node_number,
            node_name: self.node_name.clone(),
            inputs: self.inputs.clone(),
            output,
        }
    }

    fn error(&self, message: String) -> ExecutionEvent {
        ExecutionEvent::Error {
            node_id: Some(self.node_id.clone()),
            node_number: Some(self.node_number),
            node_name: Some(self.node_name.clone()),
            inputs: Some(self.inputs.clone()),
            error: message,
        }
    }
}

/// Restores the process environment when dropped
struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn apply(vars: &HashMap<String, String>) -> Self {
        let mut saved = Vec::with_capacity(vars.len());
        for (key, value) in vars {
            saved.push((key.clone(), std::env::var(key).ok()));
            std::env::set_var(key, value);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Runs submitted graphs against an immutable registry snapshot
pub struct Executor {
    registry: Arc<Registry>,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Execute `graph`, narrating node lifecycle events into `sink`
    ///
    /// Returns the view result map: every view node id mapped to the value
    /// that flowed into its `input` handle (null when unconnected or when
    /// the upstream failed). `Err` is returned only for structural failures
    /// detected before any node runs; per-node failures are absorbed into
    /// `error` events.
    pub async fn execute(
        &self,
        graph: &Graph,
        sink: &dyn EventSink,
    ) -> Result<Map<String, Value>> {
        graph.validate()?;
        let order = graph.execution_order()?;
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "executing graph"
        );

        let _env = (!graph.env_vars.is_empty()).then(|| EnvGuard::apply(&graph.env_vars));

        let mut outputs: HashMap<String, NodeOutput> = HashMap::new();
        let mut views: Map<String, Value> = Map::new();
        for node in &graph.nodes {
            if node.kind == NodeKind::View {
                views.insert(node.id.clone(), Value::Null);
            }
        }

        for (index, node_id) in order.iter().enumerate() {
            let node = graph.node(node_id).expect("ordered id came from the node list");
            debug!(node = %node.id, number = index + 1, kind = node.kind.as_str(), "dispatching node");
            match node.kind {
                NodeKind::Variable => self.run_variable(node, index + 1, sink, &mut outputs).await,
                NodeKind::List => self.run_list(node, index + 1, graph, sink, &mut outputs).await,
                NodeKind::View => {
                    self.run_view(node, index + 1, graph, sink, &mut outputs, &mut views)
                        .await
                }
                NodeKind::Function | NodeKind::ProgressFunction | NodeKind::StreamFunction => {
                    self.run_function(node, index + 1, graph, sink, &mut outputs).await
                }
                NodeKind::Unknown => unreachable!("rejected by validation"),
            }
        }
        Ok(views)
    }

    async fn run_variable(
        &self,
        node: &Node,
        number: usize,
        sink: &dyn EventSink,
        outputs: &mut HashMap<String, NodeOutput>,
    ) {
        let ctx = EventCtx::new(&node.id, number, "variable");
        sink.emit(ctx.executing()).await;
        match serde_json::from_value::<VariableData>(node.data.clone()) {
            Ok(data) => {
                let value = variable_value(data);
                outputs.insert(node.id.clone(), NodeOutput::Single(value.clone()));
                sink.emit(ctx.completed(value)).await;
            }
            Err(err) => {
                self.fail_node(&ctx, GraphError::NodeData(err.to_string()), sink, outputs)
                    .await
            }
        }
    }

    async fn run_list(
        &self,
        node: &Node,
        number: usize,
        graph: &Graph,
        sink: &dyn EventSink,
        outputs: &mut HashMap<String, NodeOutput>,
    ) {
        let mut slots: Vec<(usize, Value)> = Vec::new();
        let mut failure = None;
        for edge in graph.inbound_all(&node.id) {
            let handle = edge.target_handle();
            let Some(index) = handle
                .strip_prefix("input-")
                .and_then(|raw| raw.parse::<usize>().ok())
            else {
                warn!(node = %node.id, handle, "ignoring non-indexed list input handle");
                continue;
            };
            match resolve_edge(outputs, edge) {
                Ok(value) => slots.push((index, value)),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        slots.sort_by_key(|(index, _)| *index);

        let mut ctx = EventCtx::new(&node.id, number, "list");
        ctx.inputs = Value::Object(
            slots
                .iter()
                .map(|(index, value)| (format!("input-{index}"), value.clone()))
                .collect(),
        );
        sink.emit(ctx.executing()).await;

        match failure {
            None => {
                let value = Value::Array(slots.into_iter().map(|(_, v)| v).collect());
                outputs.insert(node.id.clone(), NodeOutput::Single(value.clone()));
                sink.emit(ctx.completed(value)).await;
            }
            Some(err) => self.fail_node(&ctx, err, sink, outputs).await,
        }
    }

    async fn run_view(
        &self,
        node: &Node,
        number: usize,
        graph: &Graph,
        sink: &dyn EventSink,
        outputs: &mut HashMap<String, NodeOutput>,
        views: &mut Map<String, Value>,
    ) {
        let resolution = graph
            .inbound(&node.id, "input")
            .map(|edge| resolve_edge(outputs, edge))
            .transpose();

        let mut ctx = EventCtx::new(&node.id, number, "view");
        match resolution {
            Ok(maybe_value) => {
                let value = maybe_value.unwrap_or(Value::Null);
                ctx.inputs = json!({ "input": value });
                sink.emit(ctx.executing()).await;
                outputs.insert(node.id.clone(), NodeOutput::Single(value.clone()));
                views.insert(node.id.clone(), value.clone());
                sink.emit(ctx.completed(value)).await;
            }
            Err(err) => {
                ctx.inputs = json!({ "input": null });
                sink.emit(ctx.executing()).await;
                self.fail_node(&ctx, err, sink, outputs).await;
            }
        }
    }

    async fn run_function(
        &self,
        node: &Node,
        number: usize,
        graph: &Graph,
        sink: &dyn EventSink,
        outputs: &mut HashMap<String, NodeOutput>,
    ) {
        let data = match serde_json::from_value::<FunctionData>(node.data.clone()) {
            Ok(data) => data,
            Err(err) => {
                let ctx = EventCtx::new(&node.id, number, node.kind.as_str());
                sink.emit(ctx.executing()).await;
                self.fail_node(&ctx, GraphError::NodeData(err.to_string()), sink, outputs)
                    .await;
                return;
            }
        };
        let mut ctx = EventCtx::new(&node.id, number, &data.function_name);

        let schema = self.schema_for(node.kind, &data.function_name);
        let Some(schema) = schema else {
            sink.emit(ctx.executing()).await;
            let err = GraphError::UnknownOperation {
                name: data.function_name.clone(),
            };
            self.fail_node(&ctx, err, sink, outputs).await;
            return;
        };

        let raw = match resolve_inputs(node, &data.values, &schema, graph, outputs) {
            Ok(raw) => raw,
            Err(err) => {
                ctx.inputs = Value::Object(data.values.clone());
                sink.emit(ctx.executing()).await;
                self.fail_node(&ctx, err, sink, outputs).await;
                return;
            }
        };

        let coerced = match coerce_inputs(&schema, raw.clone()) {
            Ok(coerced) => coerced,
            Err(err) => {
                ctx.inputs = Value::Object(raw);
                sink.emit(ctx.executing()).await;
                self.fail_node(&ctx, err, sink, outputs).await;
                return;
            }
        };
        ctx.inputs = Value::Object(coerced.clone());
        sink.emit(ctx.executing()).await;

        let result = match node.kind {
            NodeKind::Function => {
                let entry = self.registry.plain(&data.function_name).expect("schema came from entry");
                entry
                    .op
                    .invoke(coerced)
                    .map_err(|err| GraphError::NodeExecution(err.to_string()))
            }
            NodeKind::ProgressFunction => {
                let entry = self.registry.progress(&data.function_name).expect("schema came from entry");
                self.pump_progress(Arc::clone(&entry.op), coerced, &ctx, sink).await
            }
            NodeKind::StreamFunction => {
                let entry = self.registry.stream(&data.function_name).expect("schema came from entry");
                self.pump_stream(Arc::clone(&entry.op), coerced, &ctx, sink).await
            }
            _ => unreachable!("run_function only sees function kinds"),
        };

        match result.and_then(|value| finalize_output(&schema, value)) {
            Ok(output) => {
                let display = match &output {
                    NodeOutput::Single(value) => value.clone(),
                    NodeOutput::Multi(map) => Value::Object(map.clone()),
                };
                outputs.insert(node.id.clone(), output);
                sink.emit(ctx.completed(display)).await;
            }
            Err(err) => self.fail_node(&ctx, err, sink, outputs).await,
        }
    }

    /// Schema of the operation a function node names, looked up by kind
    fn schema_for(&self, kind: NodeKind, name: &str) -> Option<FunctionSchema> {
        match kind {
            NodeKind::Function => self.registry.plain(name).map(|e| e.schema.clone()),
            NodeKind::ProgressFunction => self.registry.progress(name).map(|e| e.schema.clone()),
            NodeKind::StreamFunction => self.registry.stream(name).map(|e| e.schema.clone()),
            _ => None,
        }
    }

    /// Run a progress body on a worker, forwarding its ticks as events
    async fn pump_progress(
        &self,
        op: Arc<dyn ProgressOp>,
        inputs: OpInputs,
        ctx: &EventCtx,
        sink: &dyn EventSink,
    ) -> Result<Value> {
        let (tx, mut rx) = mpsc::channel::<(f64, String)>(64);
        let handle = task::spawn_blocking(move || {
            let reporter = ProgressReporter::with_sink(move |percent, message| {
                let _ = tx.blocking_send((percent, message.to_string()));
            });
            op.invoke(inputs, &reporter)
        });

        while let Some((percent, message)) = rx.recv().await {
            sink.emit(ctx.progress(percent, &message)).await;
        }
        join_worker(handle).await
    }

    /// Run a stream body on a worker, forwarding and accumulating chunks
    async fn pump_stream(
        &self,
        op: Arc<dyn StreamOp>,
        inputs: OpInputs,
        ctx: &EventCtx,
        sink: &dyn EventSink,
    ) -> Result<Value> {
        let (tx, mut rx) = mpsc::channel::<String>(64);
        let handle = task::spawn_blocking(move || {
            let reporter = StreamReporter::with_sink(move |chunk| {
                let _ = tx.blocking_send(chunk.to_string());
            });
            op.invoke(inputs, &reporter)
        });

        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            text.push_str(&chunk);
            sink.emit(ctx.streaming(&text, &chunk)).await;
        }
        join_worker(handle).await
    }

    async fn fail_node(
        &self,
        ctx: &EventCtx,
        err: GraphError,
        sink: &dyn EventSink,
        outputs: &mut HashMap<String, NodeOutput>,
    ) {
        warn!(node = %ctx.node_id, error = %err, "node failed");
        sink.emit(ctx.error(err.to_string())).await;
        outputs.insert(ctx.node_id.clone(), NodeOutput::Single(Value::Null));
    }
}

async fn join_worker(handle: task::JoinHandle<anyhow::Result<Value>>) -> Result<Value> {
    match handle.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(GraphError::NodeExecution(err.to_string())),
        Err(join) => Err(GraphError::NodeExecution(format!("worker failed: {join}"))),
    }
}

/// Produce the value a variable node publishes, applying semantic wrapping
fn variable_value(data: VariableData) -> Value {
    let role = data.role.unwrap_or_else(|| "user".to_string());
    if data.llm_message_format {
        if data.var_type.as_deref() == Some("image") {
            json!({
                "role": role,
                "content": [ { "type": "image_url", "image_url": { "url": data.value } } ]
            })
        } else {
            json!({ "role": role, "content": data.value })
        }
    } else if data.text_content_format {
        json!({ "type": "text", "content": data.value })
    } else {
        data.value
    }
}

/// Build the raw input mapping for a function node
///
/// Precedence per expected handle: inbound edge, then the literal in node
/// data, then the schema default. A parameter with none of the three stays
/// unset and the operation's own default behavior applies.
fn resolve_inputs(
    node: &Node,
    data_values: &Map<String, Value>,
    schema: &FunctionSchema,
    graph: &Graph,
    outputs: &HashMap<String, NodeOutput>,
) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for param in &schema.params {
        if let Some(edge) = graph.inbound(&node.id, &param.name) {
            resolved.insert(param.name.clone(), resolve_edge(outputs, edge)?);
        } else if let Some(value) = data_values.get(&param.name) {
            resolved.insert(param.name.clone(), value.clone());
        } else if let Some(default) = &param.default {
            resolved.insert(param.name.clone(), default.clone());
        }
    }
    Ok(resolved)
}

/// Fetch the value an edge carries from the upstream output table
fn resolve_edge(outputs: &HashMap<String, NodeOutput>, edge: &Edge) -> Result<Value> {
    match outputs.get(&edge.source) {
        Some(NodeOutput::Single(value)) => Ok(value.clone()),
        Some(NodeOutput::Multi(map)) => {
            map.get(edge.source_handle()).cloned().ok_or_else(|| {
                GraphError::MissingOutputHandle {
                    node: edge.source.clone(),
                    handle: edge.source_handle().to_string(),
                }
            })
        }
        None => Ok(Value::Null),
    }
}

fn coerce_inputs(schema: &FunctionSchema, raw: Map<String, Value>) -> Result<OpInputs> {
    let mut coerced = Map::new();
    for (name, value) in raw {
        match schema.param(&name) {
            Some(param) => {
                coerced.insert(name.clone(), coerce(param, value)?);
            }
            None => {
                coerced.insert(name, value);
            }
        }
    }
    Ok(coerced)
}

/// Enforce the multi-output contract on an operation's return value
fn finalize_output(schema: &FunctionSchema, value: Value) -> Result<NodeOutput> {
    if !schema.is_multi_output() {
        return Ok(NodeOutput::Single(value));
    }
    let Value::Object(map) = value else {
        return Err(GraphError::NodeExecution(format!(
            "operation '{}' declares {} outputs but returned a non-mapping value",
            schema.name,
            schema.returns.len()
        )));
    };
    for ret in &schema.returns {
        if !map.contains_key(&ret.name) {
            return Err(GraphError::MissingOutputKey {
                name: schema.name.clone(),
                key: ret.name.clone(),
            });
        }
    }
    Ok(NodeOutput::Multi(map))
}
