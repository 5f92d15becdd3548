use crate::turn::{Collaborators, SessionConfig, SessionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds the collaborators for a new conversation id
pub type CollaboratorFactory = Arc<dyn Fn(&str) -> Collaborators + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active conversations (conversation_id → session)
    pub sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,

    /// Settings every new session starts from
    pub template: SessionConfig,

    pub collaborators: CollaboratorFactory,
}

impl AppState {
    pub fn new(template: SessionConfig, collaborators: CollaboratorFactory) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            template,
            collaborators,
        }
    }
}
