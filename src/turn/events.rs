use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use super::context::Role;
use super::state::ConversationState;
use crate::utterance::FluencyMetrics;

/// Notifications a host UI may depend on
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },

    /// Latest transcript while the learner is speaking
    Transcript { text: String, is_final: bool },

    /// A turn finished; learner turns carry their final metrics
    TurnCompleted {
        role: Role,
        text: String,
        metrics: Option<FluencyMetrics>,
    },

    /// Persistent problem worth showing; the session stays resumable
    Error { kind: String, message: String },
}

/// Next event for a slow subscriber
///
/// Events dropped because the subscriber fell behind are skipped. Returns
/// `None` once the session is gone.
pub async fn next_event(events: &mut broadcast::Receiver<TurnEvent>) -> Option<TurnEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => warn!("Skipped {} turn events", skipped),
            Err(RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(text: &str) -> TurnEvent {
        TurnEvent::Transcript {
            text: text.to_string(),
            is_final: false,
        }
    }

    #[tokio::test]
    async fn test_next_event_skips_lagged() {
        let (tx, mut rx) = broadcast::channel(2);
        for text in ["uno", "dos", "tres", "cuatro"] {
            tx.send(transcript(text)).unwrap();
        }

        let Some(TurnEvent::Transcript { text, .. }) = next_event(&mut rx).await else {
            panic!("expected a transcript");
        };
        assert_eq!(text, "tres");

        drop(tx);
        assert!(next_event(&mut rx).await.is_some());
        assert!(next_event(&mut rx).await.is_none());
    }
}
