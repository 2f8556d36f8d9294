//! API-key authentication middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::debug;

use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests that do not carry the configured key in `x-api-key`.
/// Applied to every route except `/health`.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key == state.api_key => next.run(req).await,
        Some(_) => {
            debug!(path = %req.uri().path(), "Rejected request with wrong API key");
            unauthorized("Invalid API key")
        }
        None => {
            debug!(path = %req.uri().path(), "Rejected request without API key");
            unauthorized("Missing API key")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "message": message } })),
    )
        .into_response()
}
