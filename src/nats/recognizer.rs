use anyhow::{Context, Result};
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::client::NatsClient;
use super::messages::TranscriptMessage;
use crate::audio::AudioFrame;
use crate::speech::{RecognitionEvent, SpeechRecognizer};

/// Recognizer backed by a NATS speech-to-text service
///
/// Captured frames are published as PCM for the service; transcripts come
/// back on the shared transcript subject and are filtered by session id.
pub struct NatsRecognizer {
    client: NatsClient,
    session_id: String,
    /// Last audio format seen, used for the final frame marker
    format: Arc<std::sync::Mutex<(u32, u16)>>,
    sequence: Arc<AtomicU32>,
    audio_task: Option<JoinHandle<()>>,
    transcript_task: Option<JoinHandle<()>>,
}

impl NatsRecognizer {
    pub fn new(client: NatsClient, session_id: String) -> Self {
        Self {
            client,
            session_id,
            format: Arc::new(std::sync::Mutex::new((16000, 1))),
            sequence: Arc::new(AtomicU32::new(0)),
            audio_task: None,
            transcript_task: None,
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for NatsRecognizer {
    async fn start(
        &mut self,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<RecognitionEvent>> {
        self.stop().await?;

        let mut transcript_sub = self
            .client
            .subscribe_transcripts()
            .await
            .context("Failed to subscribe to transcripts")?;

        let (transcript_tx, transcript_rx) = mpsc::channel(100);
        let session_id = self.session_id.clone();

        self.transcript_task = Some(tokio::spawn(async move {
            info!("Transcript receiving task started");

            while let Some(msg) = transcript_sub.next().await {
                match serde_json::from_slice::<TranscriptMessage>(&msg.payload) {
                    Ok(transcript) => {
                        if transcript.session_id != session_id {
                            continue;
                        }

                        let event = RecognitionEvent {
                            text: transcript.text,
                            is_final: !transcript.partial,
                        };
                        if transcript_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                    }
                }
            }

            info!("Transcript receiving task stopped");
        }));

        let client = self.client.clone();
        let session_id = self.session_id.clone();
        let sequence = Arc::clone(&self.sequence);
        let format = Arc::clone(&self.format);
        sequence.store(0, Ordering::SeqCst);

        self.audio_task = Some(tokio::spawn(async move {
            while let Some(frame) = audio.recv().await {
                let pcm_bytes: Vec<u8> = frame
                    .samples
                    .iter()
                    .flat_map(|s| s.to_le_bytes())
                    .collect();

                if let Ok(mut f) = format.lock() {
                    *f = (frame.sample_rate, frame.channels);
                }

                let seq = sequence.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = client
                    .publish_audio_frame(
                        &session_id,
                        &pcm_bytes,
                        frame.sample_rate,
                        frame.channels,
                        seq,
                        false,
                    )
                    .await
                {
                    // Keep streaming even if one publish fails
                    error!("Failed to publish audio frame: {:#}", e);
                }
            }
        }));

        Ok(transcript_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.transcript_task.take() {
            task.abort();
        }

        let Some(task) = self.audio_task.take() else {
            return Ok(());
        };
        task.abort();

        let (sample_rate, channels) = self.format.lock().map(|f| *f).unwrap_or((16000, 1));
        self.client
            .publish_audio_frame(
                &self.session_id,
                &[],
                sample_rate,
                channels,
                self.sequence.load(Ordering::SeqCst),
                true,
            )
            .await
            .context("Failed to send final frame")
    }

    fn name(&self) -> &str {
        "nats-stt"
    }
}
