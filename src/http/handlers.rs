use super::state::AppState;
use crate::turn::{ConversationSession, ConversationState, Message, SessionConfig};
use crate::utterance::{shadow, FluencyMetrics};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    /// Optional conversation ID (if not provided, generate UUID)
    pub conversation_id: Option<String>,

    /// Target language, defaults to the configured one
    pub language: Option<String>,

    /// Proficiency level, defaults to the configured one
    pub level: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub state: ConversationState,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationStatus {
    pub conversation_id: String,
    pub state: ConversationState,
    pub metrics: FluencyMetrics,
    pub level: f32,
    pub history_len: usize,
    /// Most recent failure surfaced to the host, if any
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShadowScoreRequest {
    pub target: String,
    pub spoken: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShadowScoreResponse {
    pub accuracy: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn not_found(conversation_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Conversation {} not found", conversation_id),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /conversations/start
/// Start a new conversation; the tutor speaks first
pub async fn start_conversation(
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> impl IntoResponse {
    let conversation_id = req
        .conversation_id
        .unwrap_or_else(|| format!("conversation-{}", uuid::Uuid::new_v4()));

    info!("Starting conversation: {}", conversation_id);

    // Check if already running
    {
        let sessions = state.sessions.read().await;
        if sessions.contains_key(&conversation_id) {
            return error_response(
                StatusCode::CONFLICT,
                format!("Conversation {} is already running", conversation_id),
            );
        }
    }

    let template = state.template.clone();
    let config = SessionConfig {
        session_id: conversation_id.clone(),
        language: req.language.unwrap_or(template.language.clone()),
        level: req.level.unwrap_or(template.level.clone()),
        ..template
    };

    let collaborators = (state.collaborators)(&conversation_id);
    let session = ConversationSession::spawn(config, collaborators);

    let session_state = match session.start_session().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start conversation: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to start conversation: {}", e),
            );
        }
    };

    {
        let mut sessions = state.sessions.write().await;
        sessions.insert(conversation_id.clone(), session);
    }

    (
        StatusCode::OK,
        Json(ConversationResponse {
            conversation_id: conversation_id.clone(),
            state: session_state,
            message: format!("Conversation {} started", conversation_id),
        }),
    )
        .into_response()
}

/// POST /conversations/end/:conversation_id
/// End a conversation and release its session
pub async fn end_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    info!("Ending conversation: {}", conversation_id);

    let session = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&conversation_id)
    };

    let Some(session) = session else {
        return not_found(&conversation_id);
    };

    let history_len = session.history().await.map(|h| h.len()).unwrap_or(0);
    let metrics = session.metrics();
    let last_error = session.last_error();

    if let Err(e) = session.shutdown().await {
        error!("Failed to shut down conversation: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to end conversation: {}", e),
        );
    }

    (
        StatusCode::OK,
        Json(ConversationStatus {
            conversation_id,
            state: ConversationState::Idle,
            metrics,
            level: 0.0,
            history_len,
            last_error,
        }),
    )
        .into_response()
}

/// POST /conversations/:conversation_id/listen
/// Resume listening after the host stopped it
pub async fn start_listening(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&conversation_id).cloned()
    };

    let Some(session) = session else {
        return not_found(&conversation_id);
    };

    match session.start_listening().await {
        Ok(session_state) => (
            StatusCode::OK,
            Json(ConversationResponse {
                conversation_id,
                state: session_state,
                message: "Listening requested".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start listening: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to start listening: {}", e),
            )
        }
    }
}

/// POST /conversations/:conversation_id/stop
/// Stop listening; the conversation stays open and can resume
pub async fn stop_listening(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&conversation_id).cloned()
    };

    let Some(session) = session else {
        return not_found(&conversation_id);
    };

    match session.stop_listening().await {
        Ok(session_state) => (
            StatusCode::OK,
            Json(ConversationResponse {
                conversation_id,
                state: session_state,
                message: "Listening stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop listening: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to stop listening: {}", e),
            )
        }
    }
}

/// GET /conversations/:conversation_id/status
/// Current state and live fluency metrics
pub async fn get_conversation_status(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&conversation_id).cloned()
    };

    let Some(session) = session else {
        return not_found(&conversation_id);
    };

    match session.history().await {
        Ok(history) => (
            StatusCode::OK,
            Json(ConversationStatus {
                conversation_id,
                state: session.state(),
                metrics: session.metrics(),
                level: session.level(),
                history_len: history.len(),
                last_error: session.last_error(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to get status: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get status: {}", e),
            )
        }
    }
}

/// GET /conversations/:conversation_id/history
/// Conversation so far
pub async fn get_conversation_history(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&conversation_id).cloned()
    };

    let Some(session) = session else {
        return not_found(&conversation_id);
    };

    match session.history().await {
        Ok(history) => (StatusCode::OK, Json::<Vec<Message>>(history)).into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to get history: {}", e),
        ),
    }
}

/// POST /shadow/score
/// Score a shadow-speaking attempt by word overlap
pub async fn shadow_score(Json(req): Json<ShadowScoreRequest>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ShadowScoreResponse {
            accuracy: shadow::score(&req.target, &req.spoken),
        }),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
