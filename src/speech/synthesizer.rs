use anyhow::Result;

/// Text-to-speech output
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, returning once playback has finished
    ///
    /// An error means playback did not complete.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Interrupt any playback in progress
    async fn stop(&self) -> Result<()>;
}
