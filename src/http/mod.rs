//! HTTP API server for the host application
//!
//! This module provides a REST API for driving conversations:
//! - POST /conversations/start - Start a new conversation
//! - POST /conversations/end/:id - End a conversation
//! - POST /conversations/:id/listen - Resume listening
//! - POST /conversations/:id/stop - Stop listening
//! - GET /conversations/:id/status - Query state, fluency metrics and the last error
//! - GET /conversations/:id/history - Get the conversation so far
//! - POST /shadow/score - Score a shadow-speaking attempt
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ShadowScoreRequest, ShadowScoreResponse};
pub use routes::create_router;
pub use state::{AppState, CollaboratorFactory};
