//! Error types and error handling for graph execution
//!
//! This module defines all error types that can occur during registry
//! construction, graph validation, and execution. All errors implement
//! `std::error::Error` via the `thiserror` crate.
//!
//! # Error Hierarchy
//!
//! ```text
//! GraphError
//! ├── Validation       - Graph structure errors (bad references, duplicates)
//! ├── Cycle            - The submitted graph contains a directed cycle
//! ├── Coercion         - A parameter value cannot take its declared type
//! ├── UnknownOperation - Node names an operation absent from the registry
//! ├── NodeExecution    - An operation body failed
//! ├── MissingOutputKey - Multi-output contract violation
//! ├── Introspection    - Operations tree could not be scanned
//! ├── Io / Json / Yaml - Wrapped system and serialization errors
//! └── NodeData         - A node's data blob does not match its kind
//! ```
//!
//! # Failure domains
//!
//! Only two failure domains abort an execution before any node runs:
//! [`GraphError::Validation`] and [`GraphError::Cycle`]. Every other variant
//! raised while a node runs is *recorded* by the executor as a per-node
//! `error` event and never re-raised: the node's output becomes null and
//! the rest of the graph continues (see [`crate::executor`]).

use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Comprehensive error type for registry, graph, and execution failures
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure validation failed
    ///
    /// Raised before any node runs: an edge references a node id that does
    /// not exist, a node id is duplicated, a node carries an unrecognized
    /// kind tag, or two edges feed the same input handle.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// The submitted graph contains a directed cycle
    ///
    /// Detected by the ordering pass; aborts the execution with a single
    /// terminal error frame.
    #[error("cycle detected in graph: execution order cannot be established")]
    Cycle,

    /// A parameter value could not be converted to its declared type
    #[error("coercion failed for parameter '{param}': {reason}")]
    Coercion { param: String, reason: String },

    /// A node names an operation that is not in the registry
    #[error("operation '{name}' not found in registry")]
    UnknownOperation { name: String },

    /// An operation body returned an error or its worker panicked
    #[error("operation failed: {0}")]
    NodeExecution(String),

    /// A multi-output operation's return lacks a declared key
    #[error("output key '{key}' missing from result of operation '{name}'")]
    MissingOutputKey { name: String, key: String },

    /// A consumer selected an output handle the producer did not emit
    #[error("upstream node '{node}' produced no output named '{handle}'")]
    MissingOutputHandle { node: String, handle: String },

    /// The operations tree could not be scanned at all
    ///
    /// Individual malformed units inside the tree are skipped with a logged
    /// diagnostic instead (see [`crate::introspect`]); this variant is for
    /// an unreadable root.
    #[error("introspection failed: {0}")]
    Introspection(String),

    /// A node's data blob does not deserialize for its kind
    #[error("invalid node data: {0}")]
    NodeData(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GraphError {
    /// Create a [`GraphError::Coercion`] with context
    pub fn coercion(param: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::Coercion {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// True when this error aborts the whole execution rather than a node
    ///
    /// Structural errors terminate the stream with a global `error` frame;
    /// everything else is absorbed into a per-node `error` event.
    pub fn is_structural(&self) -> bool {
        matches!(self, GraphError::Validation(_) | GraphError::Cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_names_the_cycle() {
        let msg = GraphError::Cycle.to_string();
        assert!(msg.contains("cycle"));
    }

    #[test]
    fn structural_classification() {
        assert!(GraphError::Validation("x".into()).is_structural());
        assert!(GraphError::Cycle.is_structural());
        assert!(!GraphError::coercion("a", "not a number").is_structural());
        assert!(!GraphError::NodeExecution("boom".into()).is_structural());
    }

    #[test]
    fn coercion_display_carries_param() {
        let err = GraphError::coercion("count", "expected integer");
        assert_eq!(
            err.to_string(),
            "coercion failed for parameter 'count': expected integer"
        );
    }
}
