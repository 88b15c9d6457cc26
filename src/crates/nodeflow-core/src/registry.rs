//! Operation registry: name-indexed lookup partitioned by kind
//!
//! Operations are values implementing one of three small capability traits
//! ([`PlainOp`], [`ProgressOp`], [`StreamOp`]), matching the three invocation
//! shapes the executor dispatches. Dispatch is a map lookup by the name
//! carried in node data, never reflection.
//!
//! Two containers live here:
//!
//! - [`OpLibrary`] holds raw callables keyed by implementation reference
//!   (`module::name`). The builtin packs register here, and the schema
//!   introspector resolves manifest `impl` bindings against it.
//! - [`Registry`] is the finished product of a registry build: three
//!   disjoint maps of schema-plus-callable entries, and the ordered schema
//!   list served to clients. It is constructed once at server start and is
//!   immutable afterwards; concurrent lookups through a shared reference
//!   are safe.
//!
//! Closures register directly thanks to blanket impls:
//!
//! ```rust
//! use nodeflow_core::registry::{OpInputs, OpLibrary};
//! use serde_json::{json, Value};
//!
//! let mut library = OpLibrary::new();
//! library.register_plain("math::double", |inputs: OpInputs| -> anyhow::Result<Value> {
//!     let n = inputs.get("n").and_then(Value::as_f64).unwrap_or(0.0);
//!     Ok(json!(n * 2.0))
//! });
//! assert!(library.get_plain("math::double").is_some());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::reporter::{ProgressReporter, StreamReporter};
use crate::schema::{FunctionSchema, OpKind};

/// Keyword mapping of coerced inputs handed to an operation
pub type OpInputs = serde_json::Map<String, Value>;

/// Synchronous operation: coerced inputs in, value out
pub trait PlainOp: Send + Sync {
    fn invoke(&self, inputs: OpInputs) -> anyhow::Result<Value>;
}

/// Long-running operation reporting percent/message ticks while it works
///
/// Runs on a dedicated worker so the executor can forward progress events
/// while the body executes.
pub trait ProgressOp: Send + Sync {
    fn invoke(&self, inputs: OpInputs, progress: &ProgressReporter) -> anyhow::Result<Value>;
}

/// Token-streaming operation emitting text chunks while it works
pub trait StreamOp: Send + Sync {
    fn invoke(&self, inputs: OpInputs, stream: &StreamReporter) -> anyhow::Result<Value>;
}

impl<F> PlainOp for F
where
    F: Fn(OpInputs) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, inputs: OpInputs) -> anyhow::Result<Value> {
        self(inputs)
    }
}

impl<F> ProgressOp for F
where
    F: Fn(OpInputs, &ProgressReporter) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, inputs: OpInputs, progress: &ProgressReporter) -> anyhow::Result<Value> {
        self(inputs, progress)
    }
}

impl<F> StreamOp for F
where
    F: Fn(OpInputs, &StreamReporter) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, inputs: OpInputs, stream: &StreamReporter) -> anyhow::Result<Value> {
        self(inputs, stream)
    }
}

/// Callable library keyed by implementation reference
///
/// References use the `module::name` convention (`math::add`,
/// `stream::spell`). The introspector binds manifest declarations to these
/// entries; the kinds are partitioned so a manifest cannot accidentally run
/// a streaming body as a plain call.
#[derive(Default)]
pub struct OpLibrary {
    plain: HashMap<String, Arc<dyn PlainOp>>,
    progress: HashMap<String, Arc<dyn ProgressOp>>,
    stream: HashMap<String, Arc<dyn StreamOp>>,
}

impl OpLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plain(&mut self, reference: &str, op: impl PlainOp + 'static) {
        self.plain.insert(reference.to_string(), Arc::new(op));
    }

    pub fn register_progress(&mut self, reference: &str, op: impl ProgressOp + 'static) {
        self.progress.insert(reference.to_string(), Arc::new(op));
    }

    pub fn register_stream(&mut self, reference: &str, op: impl StreamOp + 'static) {
        self.stream.insert(reference.to_string(), Arc::new(op));
    }

    pub fn get_plain(&self, reference: &str) -> Option<Arc<dyn PlainOp>> {
        self.plain.get(reference).cloned()
    }

    pub fn get_progress(&self, reference: &str) -> Option<Arc<dyn ProgressOp>> {
        self.progress.get(reference).cloned()
    }

    pub fn get_stream(&self, reference: &str) -> Option<Arc<dyn StreamOp>> {
        self.stream.get(reference).cloned()
    }
}

/// Schema plus callable, the unit of registry lookup
pub struct Registered<Op: ?Sized> {
    pub schema: FunctionSchema,
    pub op: Arc<Op>,
}

/// The finished registry: three disjoint kind-partitioned maps
///
/// Built once (by [`crate::introspect::introspect`] or by hand in tests),
/// then shared behind an `Arc`. Mutation after construction is not part of
/// the contract; rebuild and swap instead.
#[derive(Default)]
pub struct Registry {
    plain: HashMap<String, Registered<dyn PlainOp>>,
    progress: HashMap<String, Registered<dyn ProgressOp>>,
    stream: HashMap<String, Registered<dyn StreamOp>>,
    schemas: Vec<FunctionSchema>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("plain", &self.plain.keys().collect::<Vec<_>>())
            .field("progress", &self.progress.keys().collect::<Vec<_>>())
            .field("stream", &self.stream.keys().collect::<Vec<_>>())
            .field("schemas", &self.schemas)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain operation; duplicate names within the kind are rejected
    pub fn register_plain(&mut self, schema: FunctionSchema, op: Arc<dyn PlainOp>) -> Result<()> {
        self.check_unique(OpKind::Plain, &schema.name)?;
        self.schemas.push(schema.clone());
        self.plain.insert(schema.name.clone(), Registered { schema, op });
        Ok(())
    }

    pub fn register_progress(
        &mut self,
        schema: FunctionSchema,
        op: Arc<dyn ProgressOp>,
    ) -> Result<()> {
        self.check_unique(OpKind::Progress, &schema.name)?;
        self.schemas.push(schema.clone());
        self.progress.insert(schema.name.clone(), Registered { schema, op });
        Ok(())
    }

    pub fn register_stream(&mut self, schema: FunctionSchema, op: Arc<dyn StreamOp>) -> Result<()> {
        self.check_unique(OpKind::Stream, &schema.name)?;
        self.schemas.push(schema.clone());
        self.stream.insert(schema.name.clone(), Registered { schema, op });
        Ok(())
    }

    fn check_unique(&self, kind: OpKind, name: &str) -> Result<()> {
        let taken = match kind {
            OpKind::Plain => self.plain.contains_key(name),
            OpKind::Progress => self.progress.contains_key(name),
            OpKind::Stream => self.stream.contains_key(name),
        };
        if taken {
            return Err(GraphError::Validation(format!(
                "operation '{name}' already registered for its kind"
            )));
        }
        Ok(())
    }

    pub fn plain(&self, name: &str) -> Option<&Registered<dyn PlainOp>> {
        self.plain.get(name)
    }

    pub fn progress(&self, name: &str) -> Option<&Registered<dyn ProgressOp>> {
        self.progress.get(name)
    }

    pub fn stream(&self, name: &str) -> Option<&Registered<dyn StreamOp>> {
        self.stream.get(name)
    }

    /// All schemas, in registration (discovery) order
    pub fn schemas(&self) -> &[FunctionSchema] {
        &self.schemas
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }
}
