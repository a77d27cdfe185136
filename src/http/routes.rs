use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Bridge control
        .route("/bridge/start", post(handlers::start_bridge))
        .route("/bridge/stop", post(handlers::stop_bridge))
        // Bridge queries
        .route("/bridge/status", get(handlers::get_status))
        .route("/bridge/transcript", get(handlers::get_transcript))
        .route("/bridge/summary", get(handlers::get_summary))
        // Pending response management
        .route("/responses/pending", get(handlers::get_pending_responses))
        .route(
            "/responses/:response_id/approve",
            post(handlers::approve_response),
        )
        .route(
            "/responses/:response_id/reject",
            post(handlers::reject_response),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
