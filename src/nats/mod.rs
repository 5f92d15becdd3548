pub mod client;
pub mod generator;
pub mod messages;
pub mod recognizer;
pub mod synthesizer;

pub use client::NatsClient;
pub use generator::NatsResponseGenerator;
pub use messages::{AudioFrameMessage, TranscriptMessage};
pub use recognizer::NatsRecognizer;
pub use synthesizer::NatsSynthesizer;

use std::sync::Arc;

use crate::turn::Collaborators;

/// Collaborators for one session, all talking to services over NATS
pub fn collaborators(client: &NatsClient, session_id: &str) -> Collaborators {
    Collaborators {
        recognizer: Box::new(NatsRecognizer::new(client.clone(), session_id.to_string())),
        generator: Arc::new(NatsResponseGenerator::new(
            client.clone(),
            session_id.to_string(),
        )),
        synthesizer: Arc::new(NatsSynthesizer::new(client.clone(), session_id.to_string())),
        audio: None,
    }
}
