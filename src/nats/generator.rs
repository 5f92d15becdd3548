use anyhow::{anyhow, Result};

use super::client::NatsClient;
use super::messages::{GenerateReplyMessage, GenerateRequestMessage, HistoryEntry};
use crate::speech::{GenerationRequest, ResponseGenerator};

/// Response generator reached over NATS request/reply
pub struct NatsResponseGenerator {
    client: NatsClient,
    session_id: String,
}

impl NatsResponseGenerator {
    pub fn new(client: NatsClient, session_id: String) -> Self {
        Self { client, session_id }
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for NatsResponseGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let message = GenerateRequestMessage {
            session_id: self.session_id.clone(),
            language: request.language,
            level: request.level,
            history: request.history.iter().map(HistoryEntry::from).collect(),
        };

        let subject = self.client.config().generate_subject.clone();
        let reply: GenerateReplyMessage = self.client.request_json(subject, &message).await?;

        match (reply.text, reply.error) {
            (_, Some(error)) => Err(anyhow!("generator service: {}", error)),
            (Some(text), None) => Ok(text),
            (None, None) => Err(anyhow!("generator service returned no text")),
        }
    }
}
