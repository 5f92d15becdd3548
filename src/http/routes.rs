use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Conversation control
        .route("/conversations/start", post(handlers::start_conversation))
        .route(
            "/conversations/end/:conversation_id",
            post(handlers::end_conversation),
        )
        .route(
            "/conversations/:conversation_id/listen",
            post(handlers::start_listening),
        )
        .route(
            "/conversations/:conversation_id/stop",
            post(handlers::stop_listening),
        )
        // Conversation queries
        .route(
            "/conversations/:conversation_id/status",
            get(handlers::get_conversation_status),
        )
        .route(
            "/conversations/:conversation_id/history",
            get(handlers::get_conversation_history),
        )
        // Exercises
        .route("/shadow/score", post(handlers::shadow_score))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
