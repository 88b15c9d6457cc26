//! REST API layer for the nodeflow server
//!
//! Three endpoints over the core engine:
//! - `GET /api/v1/functions` returns the registered operation schemas
//! - `POST /api/v1/execute` runs synchronously, view result map as JSON
//! - `POST /api/v1/execute/stream` emits the SSE trace of the execution
//!
//! plus `GET /health` for liveness.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use routes::{create_router, AppState, ExecutionGate};
