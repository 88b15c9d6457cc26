//! # nodeflow-server
//!
//! HTTP surface for the nodeflow graph executor: schema listing,
//! synchronous execution, and SSE streaming execution over a registry
//! built from a nodepack operations tree. The `nodeflow` binary wires this
//! router to a listener; see [`api`] for the endpoints.

pub mod api;
