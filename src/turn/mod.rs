//! Conversation turn-taking
//!
//! This module provides the `ConversationSession` orchestrator that manages:
//! - Who has the floor (`ConversationState` and its transition table)
//! - Capture of the learner's speech and end-of-turn detection
//! - Reply generation and synthesis through the speech collaborators
//! - Recovery from recognizer, generator and synthesizer failures
//! - Published state, metrics and turn events for a host UI

mod config;
mod context;
mod events;
mod session;
mod silence;
mod state;

pub use config::SessionConfig;
pub use context::{Message, Role, TurnContext};
pub use events::{next_event, TurnEvent};
pub use session::{Collaborators, ConversationSession, SessionHandle};
pub use silence::{SilenceDetector, DEFAULT_QUIET_PERIOD};
pub use state::{ConversationState, TurnTrigger};
