use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::turn::Message;

/// Everything the response generator is allowed to see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Conversation so far, oldest first
    pub history: Vec<Message>,
    /// Target language, e.g. "es"
    pub language: String,
    /// Proficiency level, e.g. "A2"
    pub level: String,
}

/// Produces the tutor's next line
#[async_trait::async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate a reply; an empty history asks for an opening line
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}
