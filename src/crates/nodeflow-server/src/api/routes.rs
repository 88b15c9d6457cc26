//! API route definitions and shared application state

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tower_http::trace::TraceLayer;
use tracing::debug;

use nodeflow_core::introspect::introspect;
use nodeflow_core::{OpLibrary, Registry};

use crate::api::error::{ApiError, ApiResult};
use crate::api::handlers;

/// Serializes executions around the env-var window
///
/// An execution that mutates the process environment takes the exclusive
/// side; everything else shares. While an env window is open no other
/// execution can observe the host environment.
#[derive(Clone, Default)]
pub struct ExecutionGate {
    lock: Arc<RwLock<()>>,
}

/// Held for the lifetime of one execution
pub enum GatePermit {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl ExecutionGate {
    pub async fn acquire(&self, exclusive: bool) -> GatePermit {
        if exclusive {
            GatePermit::Exclusive(Arc::clone(&self.lock).write_owned().await)
        } else {
            GatePermit::Shared(Arc::clone(&self.lock).read_owned().await)
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    registry: Arc<RwLock<Arc<Registry>>>,
    library: Arc<OpLibrary>,
    ops_root: Arc<PathBuf>,
    reload: bool,
    pub gate: ExecutionGate,
}

impl AppState {
    pub fn new(registry: Registry, library: OpLibrary, ops_root: PathBuf, reload: bool) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Arc::new(registry))),
            library: Arc::new(library),
            ops_root: Arc::new(ops_root),
            reload,
            gate: ExecutionGate::default(),
        }
    }

    /// Registry snapshot for one request
    ///
    /// With `--reload` the operations tree is re-scanned first, so manifest
    /// edits show up without a restart.
    pub async fn snapshot(&self) -> ApiResult<Arc<Registry>> {
        if self.reload {
            debug!(root = %self.ops_root.display(), "reloading operations tree");
            let rebuilt = introspect(&self.ops_root, &self.library)
                .map_err(|err| ApiError::InternalError(err.to_string()))?;
            let rebuilt = Arc::new(rebuilt);
            *self.registry.write().await = Arc::clone(&rebuilt);
            Ok(rebuilt)
        } else {
            Ok(Arc::clone(&*self.registry.read().await))
        }
    }
}

/// Build the complete API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(handlers::health))
        // Operation schema listing
        .route("/api/v1/functions", get(handlers::list_functions))
        // Graph execution
        .route("/api/v1/execute", post(handlers::execute))
        .route("/api/v1/execute/stream", post(handlers::execute_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
