//! Request handlers for the three endpoints plus health
//!
//! The streaming handler adapts the executor's event stream into SSE
//! frames (`data: <json>\n\n`). The response disables intermediary caching
//! and proxy buffering so frames reach the client as they happen; the
//! env-var gate permit rides on the execution task, so it is released when
//! the run finishes even if the client disconnects first.

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::info;

use nodeflow_core::{stream_execution_guarded, Executor, FunctionSchema, Graph, NullSink};

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::AppState;

/// Liveness probe
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Schema listing for every registered operation
pub async fn list_functions(State(state): State<AppState>) -> ApiResult<Json<Vec<FunctionSchema>>> {
    let registry = state.snapshot().await?;
    Ok(Json(registry.schemas().to_vec()))
}

/// Run a graph to completion and return the view result map
pub async fn execute(
    State(state): State<AppState>,
    Json(graph): Json<Graph>,
) -> ApiResult<Json<Value>> {
    let _permit = state.gate.acquire(!graph.env_vars.is_empty()).await;
    let registry = state.snapshot().await?;
    info!(nodes = graph.nodes.len(), "sync execute");

    let results = Executor::new(registry)
        .execute(&graph, &NullSink)
        .await
        .map_err(|err| ApiError::ExecutionFailed(err.to_string()))?;
    Ok(Json(json!({ "results": results })))
}

/// Run a graph, narrating the execution as Server-Sent Events
pub async fn execute_stream(
    State(state): State<AppState>,
    Json(graph): Json<Graph>,
) -> ApiResult<impl IntoResponse> {
    let permit = state.gate.acquire(!graph.env_vars.is_empty()).await;
    let registry = state.snapshot().await?;
    info!(nodes = graph.nodes.len(), "stream execute");

    let mut events = stream_execution_guarded(registry, graph, permit);
    let sse_stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            yield Event::default().json_data(&event);
        }
    };

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    Ok((
        headers,
        Sse::new(sse_stream).keep_alive(KeepAlive::default()),
    ))
}
