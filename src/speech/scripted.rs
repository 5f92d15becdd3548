// Scripted collaborators
//
// Deterministic stand-ins for the recognizer, generator and synthesizer.
// They drive the `simulate` command and the session tests. Every type is a
// cheap clone over shared state, so a caller can keep a copy for inspection
// after handing one to a session.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::generator::{GenerationRequest, ResponseGenerator};
use super::recognizer::{RecognitionEvent, SpeechRecognizer};
use super::synthesizer::SpeechSynthesizer;
use crate::audio::AudioFrame;

/// One step of a scripted listening turn, timed from the previous step
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a transcript event
    Say {
        after: Duration,
        event: RecognitionEvent,
    },
    /// Close the stream early, as a failing recognizer would
    Drop { after: Duration },
}

impl ScriptStep {
    pub fn partial(after_ms: u64, text: &str) -> Self {
        ScriptStep::Say {
            after: Duration::from_millis(after_ms),
            event: RecognitionEvent::partial(text),
        }
    }

    pub fn final_result(after_ms: u64, text: &str) -> Self {
        ScriptStep::Say {
            after: Duration::from_millis(after_ms),
            event: RecognitionEvent::final_result(text),
        }
    }

    pub fn drop_stream(after_ms: u64) -> Self {
        ScriptStep::Drop {
            after: Duration::from_millis(after_ms),
        }
    }
}

/// Build the partial results a recognizer would produce for `sentence`,
/// one word every `word_ms`
pub fn speak_words(sentence: &str, first_ms: u64, word_ms: u64) -> Vec<ScriptStep> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    (1..=words.len())
        .map(|n| {
            let after = if n == 1 { first_ms } else { word_ms };
            ScriptStep::partial(after, &words[..n].join(" "))
        })
        .collect()
}

#[derive(Default)]
struct RecognizerState {
    turns: VecDeque<Vec<ScriptStep>>,
    failing_starts: usize,
    starts: usize,
    stops: usize,
    tasks: Vec<JoinHandle<()>>,
}

/// Recognizer that plays back one script per listening turn
///
/// Once the scripts run out, each new turn stays silent.
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    state: Arc<Mutex<RecognizerState>>,
}

impl ScriptedRecognizer {
    pub fn new(turns: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecognizerState {
                turns: turns.into(),
                ..Default::default()
            })),
        }
    }

    /// Make the next `count` calls to `start` fail
    pub async fn fail_next_starts(&self, count: usize) {
        self.state.lock().await.failing_starts = count;
    }

    pub async fn starts(&self) -> usize {
        self.state.lock().await.starts
    }

    pub async fn stops(&self) -> usize {
        self.state.lock().await.stops
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn start(
        &mut self,
        mut audio: mpsc::Receiver<AudioFrame>,
    ) -> Result<mpsc::Receiver<RecognitionEvent>> {
        let mut state = self.state.lock().await;
        state.starts += 1;

        if state.failing_starts > 0 {
            state.failing_starts -= 1;
            return Err(anyhow!("recognizer unavailable"));
        }

        let script = state.turns.pop_front().unwrap_or_default();
        let (tx, rx) = mpsc::channel(32);

        let drain = tokio::spawn(async move { while audio.recv().await.is_some() {} });

        let playback = tokio::spawn(async move {
            for step in script {
                match step {
                    ScriptStep::Say { after, event } => {
                        tokio::time::sleep(after).await;
                        debug!("Scripted transcript: {}", event.text);
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    ScriptStep::Drop { after } => {
                        tokio::time::sleep(after).await;
                        return;
                    }
                }
            }
            tx.closed().await;
        });

        state.tasks.push(drain);
        state.tasks.push(playback);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.stops += 1;
        for task in state.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct GeneratorState {
    replies: VecDeque<Result<String, String>>,
    requests: Vec<GenerationRequest>,
}

/// Generator that answers from a queue of canned replies
#[derive(Clone)]
pub struct ScriptedGenerator {
    state: Arc<Mutex<GeneratorState>>,
    delay: Duration,
    default_reply: String,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GeneratorState {
                replies: replies.into(),
                requests: Vec::new(),
            })),
            delay: Duration::from_millis(50),
            default_reply: "Tell me more.".to_string(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every request received so far
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.state.lock().await.requests.clone()
    }
}

#[async_trait::async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let reply = {
            let mut state = self.state.lock().await;
            state.requests.push(request);
            state.replies.pop_front()
        };

        tokio::time::sleep(self.delay).await;

        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.default_reply.clone()),
        }
    }
}

#[derive(Default)]
struct SynthesizerState {
    failures: VecDeque<bool>,
    spoken: Vec<String>,
    stops: usize,
}

/// Synthesizer that "speaks" by sleeping for a while per word
#[derive(Clone)]
pub struct ScriptedSynthesizer {
    state: Arc<Mutex<SynthesizerState>>,
    per_word: Duration,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SynthesizerState::default())),
            per_word: Duration::from_millis(100),
        }
    }

    pub fn with_word_duration(mut self, per_word: Duration) -> Self {
        self.per_word = per_word;
        self
    }

    /// Queue outcomes for upcoming calls; `true` makes that call fail
    pub async fn fail_pattern(&self, pattern: Vec<bool>) {
        self.state.lock().await.failures = pattern.into();
    }

    /// Texts passed to `speak`, including ones that failed
    pub async fn spoken(&self) -> Vec<String> {
        self.state.lock().await.spoken.clone()
    }

    pub async fn stops(&self) -> usize {
        self.state.lock().await.stops
    }
}

impl Default for ScriptedSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn speak(&self, text: &str) -> Result<()> {
        let fail = {
            let mut state = self.state.lock().await;
            state.spoken.push(text.to_string());
            state.failures.pop_front().unwrap_or(false)
        };

        if fail {
            return Err(anyhow!("audio output unavailable"));
        }

        let words = text.split_whitespace().count().max(1) as u32;
        tokio::time::sleep(self.per_word * words).await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.lock().await.stops += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_words_builds_growing_partials() {
        let steps = speak_words("I am fine", 300, 200);
        let texts: Vec<String> = steps
            .iter()
            .map(|step| match step {
                ScriptStep::Say { event, .. } => event.text.clone(),
                ScriptStep::Drop { .. } => String::new(),
            })
            .collect();
        assert_eq!(texts, vec!["I", "I am", "I am fine"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_generator_falls_back_to_default() {
        let generator = ScriptedGenerator::new(vec![Err("offline".to_string())]);
        let request = GenerationRequest {
            history: Vec::new(),
            language: "es".to_string(),
            level: "A1".to_string(),
        };

        assert!(generator.generate(request.clone()).await.is_err());
        assert_eq!(generator.generate(request).await.unwrap(), "Tell me more.");
        assert_eq!(generator.requests().await.len(), 2);
    }
}
