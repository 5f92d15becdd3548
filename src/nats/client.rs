use anyhow::{Context, Result};
use async_nats::Client;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::NatsConfig;

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(Duration::from_secs(config.request_timeout_secs)))
            .connect(config.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Publish audio frame to NATS
    pub async fn publish_audio_frame(
        &self,
        session_id: &str,
        pcm_bytes: &[u8],
        sample_rate: u32,
        channels: u16,
        sequence: u32,
        is_final: bool,
    ) -> Result<()> {
        let subject = format!("{}.{}", self.config.audio_subject, session_id);

        let message = super::messages::AudioFrameMessage {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate,
            channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: is_final,
        };

        self.publish_json(subject.clone(), &message)
            .await
            .context("Failed to publish audio frame")?;

        debug!(
            "Published audio frame to {} (sequence={}, bytes={}, final={})",
            subject,
            sequence,
            pcm_bytes.len(),
            is_final
        );

        Ok(())
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        // Partial and final results share one wildcard subject;
        // callers filter by session_id in the payload
        let subject = self.config.transcript_subject.clone();

        info!("Subscribing to transcripts on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to transcripts")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }

    pub async fn publish_json<T: Serialize>(&self, subject: String, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish message")?;

        Ok(())
    }

    /// Send a JSON request and decode the JSON reply
    pub async fn request_json<Req, Resp>(&self, subject: String, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)?;

        let reply = self
            .client
            .request(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Request on {} failed", subject))?;

        serde_json::from_slice(&reply.payload)
            .with_context(|| format!("Malformed reply on {}", subject))
    }
}
