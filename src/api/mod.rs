use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::AppState;

pub mod handlers;

/// Build the item/approval API router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/items/:variant",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route(
            "/items/:variant/:id",
            get(handlers::get_item).put(handlers::decide_item),
        )
        .route("/items/:variant/:id/submit", post(handlers::submit_item))
        .route("/items/:variant/:id/status", post(handlers::set_item_status))
        .route("/items/:variant/:id/history", get(handlers::item_history))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

/// The full application: health checks, metrics, and the versioned API.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api_router())
        .fallback(fallback_404)
        .with_state(state)
}

async fn fallback_404(method: Method, uri: Uri) -> AppError {
    AppError::UnknownRoute(format!("{} {}", method, uri.path()))
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.workflow.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.workflow.metrics().render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("metrics render failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
