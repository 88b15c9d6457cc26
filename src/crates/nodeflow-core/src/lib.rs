//! # nodeflow-core
//!
//! Core graph execution engine for nodeflow: dependency-ordered, in-process
//! execution of heterogeneous node graphs whose function nodes invoke
//! registered operations.
//!
//! ## Overview
//!
//! Clients submit a graph of typed nodes (variables, lists, views, and the
//! three function kinds) connected by handle-addressed edges. The engine
//! orders the nodes topologically, resolves each node's inputs from
//! upstream outputs or literal node data, coerces values to the declared
//! parameter types, dispatches to the kind-specific runner, and narrates
//! every lifecycle transition as an [`ExecutionEvent`]. View-node values are
//! collected into the result map the terminal `done` frame carries.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`schema`] | Typed operation descriptions served to clients and consumed by coercion |
//! | [`registry`] | Operation traits, callable library, kind-partitioned registry |
//! | [`introspect`] | Filesystem discovery of operation manifests |
//! | [`coerce`] | Raw client values → declared parameter types |
//! | [`graph`] | Wire-shape graph model, validation, Kahn ordering |
//! | [`reporter`] | Progress / stream capability objects for operation bodies |
//! | [`event`] | Event grammar and the sink abstraction |
//! | [`executor`] | The run loop: input resolution, runners, env-var window |
//! | [`stream`] | Execute-to-stream driver with terminal-frame guarantees |
//! | [`error`] | Error taxonomy ([`GraphError`]) |
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nodeflow_core::{introspect::introspect, stream::stream_execution, Graph};
//!
//! let registry = Arc::new(introspect("nodepacks".as_ref(), &library)?);
//! let graph: Graph = serde_json::from_str(request_body)?;
//! let mut events = stream_execution(registry, graph);
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

pub mod coerce;
pub mod error;
pub mod event;
pub mod executor;
pub mod graph;
pub mod introspect;
pub mod registry;
pub mod reporter;
pub mod schema;
pub mod stream;

pub use error::{GraphError, Result};
pub use event::{ChannelSink, EventSink, ExecutionEvent, MemorySink, NullSink};
pub use executor::Executor;
pub use graph::{Edge, Graph, Node, NodeKind};
pub use registry::{OpInputs, OpLibrary, PlainOp, ProgressOp, Registry, StreamOp};
pub use reporter::{ProgressReporter, StreamReporter};
pub use schema::{FunctionSchema, OpKind, ParamSchema, ReturnSchema, TypeTag};
pub use stream::{stream_execution, stream_execution_guarded};
