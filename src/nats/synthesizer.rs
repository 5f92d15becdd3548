use anyhow::{anyhow, Result};
use tracing::debug;

use super::client::NatsClient;
use super::messages::{SpeakReplyMessage, SpeakRequestMessage, StopSpeakingMessage};
use crate::speech::SpeechSynthesizer;

/// Speech synthesis through a NATS text-to-speech service
///
/// The service answers a speak request once playback has finished.
pub struct NatsSynthesizer {
    client: NatsClient,
    session_id: String,
}

impl NatsSynthesizer {
    pub fn new(client: NatsClient, session_id: String) -> Self {
        Self { client, session_id }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for NatsSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        let request = SpeakRequestMessage {
            session_id: self.session_id.clone(),
            text: text.to_string(),
        };

        let subject = self.client.config().speak_subject.clone();
        let reply: SpeakReplyMessage = self.client.request_json(subject, &request).await?;

        if reply.ok {
            Ok(())
        } else {
            Err(anyhow!(
                "tts service: {}",
                reply.error.unwrap_or_else(|| "playback failed".to_string())
            ))
        }
    }

    async fn stop(&self) -> Result<()> {
        debug!("Requesting playback stop for {}", self.session_id);
        let subject = self.client.config().stop_speaking_subject.clone();
        self.client
            .publish_json(
                subject,
                &StopSpeakingMessage {
                    session_id: self.session_id.clone(),
                },
            )
            .await
    }
}
