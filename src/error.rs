//! Error types for the conversation engine

use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations
pub type ConversationResult<T> = Result<T, ConversationError>;

/// Errors that can occur while running a conversation session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversationError {
    #[error("speech recognition failed: {0}")]
    Recognition(String),

    #[error("response generation failed: {0}")]
    Generation(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("conversation session is closed")]
    SessionClosed,
}

impl ConversationError {
    /// Short category name used in logs and error notifications
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationError::Recognition(_) => "recognition",
            ConversationError::Generation(_) => "generation",
            ConversationError::Synthesis(_) => "synthesis",
            ConversationError::Capture(_) => "capture",
            ConversationError::Timeout(_) => "timeout",
            ConversationError::SessionClosed => "session",
        }
    }
}
