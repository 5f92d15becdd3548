use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "conversation-<uuid>")
    pub session_id: String,

    /// Target language the learner practises (e.g., "es")
    pub language: String,

    /// Proficiency level passed to the generator (e.g., "A2")
    pub level: String,

    /// Quiet period after the last transcript update that ends the turn
    /// Default: 1.5 seconds
    pub silence_timeout: Duration,

    /// Gap between transcript updates counted as a pause
    /// Default: 500 milliseconds
    pub pause_threshold: Duration,

    /// Hard cap on one listening turn, `None` for no cap
    pub max_turn_duration: Option<Duration>,

    /// Give up on the response generator after this long
    pub generation_timeout: Duration,

    /// Consecutive failures of one kind before an error is surfaced
    pub failure_threshold: u32,

    /// Delay before re-acquiring capture after a recognition failure
    pub recognition_retry_delay: Duration,

    /// Spoken instead of a reply when generation fails
    pub fallback_reply: Option<String>,

    /// Amplitude smoothing factor in [0, 1), 0 = none
    pub level_smoothing: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("conversation-{}", uuid::Uuid::new_v4()),
            language: "es".to_string(),
            level: "A2".to_string(),
            silence_timeout: Duration::from_millis(1500),
            pause_threshold: Duration::from_millis(500),
            max_turn_duration: Some(Duration::from_secs(60)),
            generation_timeout: Duration::from_secs(20),
            failure_threshold: 3,
            recognition_retry_delay: Duration::from_millis(250),
            fallback_reply: None,
            level_smoothing: 0.0,
        }
    }
}
