use serde::{Deserialize, Serialize};

use crate::turn::{Message, Role};

/// Audio frame message published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    pub confidence: Option<f32>,
}

/// One history line as sent to the generator service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            text: message.text.clone(),
        }
    }
}

/// Request for the tutor's next line
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateRequestMessage {
    pub session_id: String,
    pub language: String,
    pub level: String,
    pub history: Vec<HistoryEntry>,
}

/// Generator reply; exactly one of `text` and `error` is set
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReplyMessage {
    pub text: Option<String>,
    pub error: Option<String>,
}

/// Ask the TTS service to speak; it replies once playback ends
#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakRequestMessage {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpeakReplyMessage {
    pub ok: bool,
    pub error: Option<String>,
}

/// Interrupt playback for a session
#[derive(Debug, Serialize, Deserialize)]
pub struct StopSpeakingMessage {
    pub session_id: String,
}
