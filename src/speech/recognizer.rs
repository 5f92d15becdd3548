use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio::AudioFrame;

/// One result from a streaming recognizer
///
/// `text` is the full utterance recognized so far, not a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub text: String,
    pub is_final: bool,
}

impl RecognitionEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Streaming speech recognizer
///
/// At most one stream is active per listening period. A stream that closes
/// before `stop` is called is treated as a recognition failure.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin recognizing the given audio, returning the transcript stream
    async fn start(
        &mut self,
        audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<RecognitionEvent>>;

    /// Cancel the active stream, if any
    async fn stop(&mut self) -> Result<()>;

    /// Get recognizer name for logging
    fn name(&self) -> &str;
}
