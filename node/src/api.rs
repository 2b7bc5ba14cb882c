//! # JSON-RPC + WebSocket API
//!
//! The axum router for the node's HTTP interface. Handlers share
//! [`AppState`] through axum's `State` extractor. Host calls take a lock and
//! may wait on disk, so handlers run them with `spawn_blocking`.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description                              |
//! |--------|-----------|------------------------------------------|
//! | GET    | `/health` | Liveness probe                           |
//! | GET    | `/status` | Deployment summary                       |
//! | POST   | `/rpc`    | JSON-RPC 2.0 gateway                     |
//! | GET    | `/ws`     | Push-only stream of contract events      |
//!
//! ## Error codes
//!
//! | Code     | Meaning                                          |
//! |----------|--------------------------------------------------|
//! | `-32000` | Contract rejected the call; `data.kind` says why |
//! | `-32001` | Signature or key invalid                         |
//! | `-32002` | Nonce not above the caller's last one            |
//! | `-32600` | Not a JSON-RPC 2.0 request                       |
//! | `-32601` | Unknown method                                   |
//! | `-32602` | Malformed params                                 |
//! | `-32603` | Internal (storage) failure                       |

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use titan_protocol::config::MAX_REQUEST_BYTES;

use crate::host::{self, Host, HostError, HostSummary};
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Reported version string.
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub host: Arc<Host>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the API router with CORS, tracing and a request size limit.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,
    pub method: String,
    /// Positional array for queries, a signed call object for mutations.
    pub params: Option<serde_json::Value>,
    /// Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcResponse {
    fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: serde_json::Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub protocol_version: String,
    #[serde(flatten)]
    pub deployment: HostSummary,
    pub uptime_secs: i64,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let host = Arc::clone(&state.host);
    let deployment = tokio::task::spawn_blocking(move || host.summary())
        .await
        .map_err(|e| {
            tracing::error!("status task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let now = Utc::now();
    Ok(Json(StatusResponse {
        version: state.version.clone(),
        protocol_version: titan_protocol::config::PROTOCOL_VERSION.to_string(),
        deployment,
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    }))
}

/// `POST /rpc`: JSON-RPC 2.0 gateway into the host.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse::failure(
            req.id,
            JsonRpcError {
                code: -32600,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            },
        ));
    }

    // Unknown names share one label so clients cannot grow the series set.
    let label = if host::is_known_method(&req.method) {
        req.method.as_str()
    } else {
        "unknown"
    };

    let started = Instant::now();
    let host = Arc::clone(&state.host);
    let method = req.method.clone();
    let params = req.params;
    let result = tokio::task::spawn_blocking(move || host.handle(&method, params))
        .await
        .unwrap_or_else(|e| Err(HostError::Internal(format!("rpc task failed: {e}"))));
    state
        .metrics
        .call_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            state.metrics.record_call(label, "ok");
            Json(JsonRpcResponse::success(req.id, value))
        }
        Err(e) => {
            state.metrics.record_call(label, e.outcome());
            if e.code() == -32603 {
                tracing::error!(method = %req.method, error = %e, "rpc call failed");
            } else {
                tracing::debug!(method = %req.method, error = %e, "rpc call rejected");
            }
            Json(JsonRpcResponse::failure(
                req.id,
                JsonRpcError {
                    code: e.code(),
                    message: e.to_string(),
                    data: e.data(),
                },
            ))
        }
    }
}

/// `GET /ws`: upgrade to a push-only stream of JSON contract events.
/// Client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.host.subscribe();
    state.metrics.ws_subscribers.inc();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.metrics.ws_subscribers.dec();
}
