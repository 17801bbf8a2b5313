use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    mcp::{self, PROTOCOL_VERSION},
    models::parse_error_reply,
    AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/mcp", post(mcp_endpoint))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn mcp_endpoint(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let raw: Value = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(_) => return (StatusCode::BAD_REQUEST, Json(parse_error_reply())),
    };

    let reply = mcp::dispatch(&state, raw).await;
    (status_for_reply(&reply), Json(reply))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "timestamp": Utc::now().to_rfc3339()}))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "grafana-mcp-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "protocolVersion": PROTOCOL_VERSION,
        "endpoints": {
            "mcp": "/mcp",
            "health": "/health"
        }
    }))
}

/// Maps envelope error codes onto transport status codes. HTTP-transport
/// concern only; the stdio transport writes replies verbatim.
fn status_for_reply(reply: &Value) -> StatusCode {
    let Some(code) = reply
        .get("error")
        .and_then(|error| error.get("code"))
        .and_then(Value::as_i64)
    else {
        return StatusCode::OK;
    };

    match code {
        -32700 | -32600 | -32602 => StatusCode::BAD_REQUEST,
        -32601 => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
