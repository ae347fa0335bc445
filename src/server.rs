//! HTTP surface
//!
//! A thin transport over the query façade: one lookup route plus a
//! liveness probe. Domain results map onto the JSON envelope here —
//! `{"tree": …}` on a hit, `{"error": …}` otherwise.

use crate::error::CanopyError;
use crate::service::TreeService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application-wide state shared across routes.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TreeService>,
}

/// Build the application router.
pub fn router(service: Arc<TreeService>) -> Router {
    Router::new()
        .route("/tree", post(lookup_tree))
        .route("/health/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// `POST /tree` request body
#[derive(Debug, Deserialize)]
pub struct TreeRequest {
    /// Source name
    pub tree: String,

    /// Node id, a decimal string
    pub id: String,
}

/// GET /health/ping - liveness probe
async fn ping() -> &'static str {
    "pong"
}

/// POST /tree - subtree lookup by source name and node id
async fn lookup_tree(State(state): State<AppState>, Json(request): Json<TreeRequest>) -> Response {
    let Ok(id) = request.id.trim().parse::<u64>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid id '{}'", request.id),
        );
    };

    match state.service.lookup(&request.tree, id).await {
        Ok(Some(node)) => (StatusCode::OK, Json(json!({ "tree": node }))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("id {id} not found in source '{}'", request.tree),
        ),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

fn status_for(error: &CanopyError) -> StatusCode {
    match error {
        CanopyError::UnknownSource(_) => StatusCode::NOT_FOUND,
        CanopyError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, reason: String) -> Response {
    (status, Json(json!({ "error": reason }))).into_response()
}
