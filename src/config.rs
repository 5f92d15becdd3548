use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::AudioBackendConfig;
use crate::turn::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub audio: AudioConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Prefix for outgoing audio frames, the session id is appended
    pub audio_subject: String,
    pub transcript_subject: String,
    pub generate_subject: String,
    pub speak_subject: String,
    pub stop_speaking_subject: String,
    /// Upper bound on a single request/reply exchange
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u64,
    pub level_smoothing: f32,
}

#[derive(Debug, Deserialize)]
pub struct ConversationConfig {
    pub language: String,
    pub level: String,
    pub silence_timeout_ms: u64,
    pub pause_threshold_ms: u64,
    /// 0 disables the cap
    pub max_turn_secs: u64,
    pub generation_timeout_secs: u64,
    pub failure_threshold: u32,
    pub recognition_retry_ms: u64,
    pub fallback_reply: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SPEAKLOOP").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Capture settings for file or device backends
    pub fn audio_backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
            buffer_duration_ms: self.audio.frame_ms,
        }
    }

    /// Runtime settings for a new session
    pub fn session_config(&self, session_id: String) -> SessionConfig {
        let c = &self.conversation;
        SessionConfig {
            session_id,
            language: c.language.clone(),
            level: c.level.clone(),
            silence_timeout: Duration::from_millis(c.silence_timeout_ms),
            pause_threshold: Duration::from_millis(c.pause_threshold_ms),
            max_turn_duration: (c.max_turn_secs > 0).then(|| Duration::from_secs(c.max_turn_secs)),
            generation_timeout: Duration::from_secs(c.generation_timeout_secs),
            failure_threshold: c.failure_threshold,
            recognition_retry_delay: Duration::from_millis(c.recognition_retry_ms),
            fallback_reply: c.fallback_reply.clone(),
            level_smoothing: self.audio.level_smoothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builds_session_config() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("speakloop.toml");
        std::fs::write(
            &path,
            include_str!("../config/speakloop.toml").replace("max_turn_secs = 60", "max_turn_secs = 0"),
        )?;

        let cfg = Config::load(path.to_str().unwrap_or_default())?;
        assert_eq!(cfg.service.http.port, 3030);
        assert_eq!(cfg.nats.transcript_subject, "stt.text.>");

        let session = cfg.session_config("conversation-7".to_string());
        assert_eq!(session.session_id, "conversation-7");
        assert_eq!(session.silence_timeout, Duration::from_millis(1500));
        assert_eq!(session.max_turn_duration, None);
        assert_eq!(session.fallback_reply, None);
        assert!((session.level_smoothing - 0.3).abs() < f32::EPSILON);

        let audio = cfg.audio_backend_config();
        assert_eq!(audio.target_sample_rate, 16000);
        assert_eq!(audio.target_channels, 1);
        assert_eq!(audio.buffer_duration_ms, 100);

        Ok(())
    }
}
