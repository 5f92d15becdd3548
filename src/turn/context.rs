use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::speech::GenerationRequest;
use crate::utterance::{FluencyMetrics, UtteranceAccumulator, UtteranceSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The tutor (generated and spoken replies)
    Assistant,
    Learner,
}

/// One line of conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
    /// Final fluency metrics for learner turns
    pub metrics: Option<FluencyMetrics>,
}

/// State of one conversational exchange
///
/// Owned by the session orchestrator; history is append-only.
pub struct TurnContext {
    pub language: String,
    pub level: String,
    history: Vec<Message>,
    accumulator: UtteranceAccumulator,
    metrics: FluencyMetrics,
}

impl TurnContext {
    pub fn new(language: String, level: String, pause_threshold: Duration) -> Self {
        Self {
            language,
            level,
            history: Vec::new(),
            accumulator: UtteranceAccumulator::new(pause_threshold, Instant::now()),
            metrics: FluencyMetrics::default(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Forget the previous exchange
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.history.push(Message {
            role: Role::Assistant,
            text: text.to_string(),
            at: Utc::now(),
            metrics: None,
        });
    }

    /// Reset utterance tracking for a new listening turn
    pub fn begin_turn(&mut self, now: Instant) {
        self.accumulator.reset(now);
        self.metrics = FluencyMetrics::default();
    }

    /// Apply a partial transcript and return refreshed live metrics
    pub fn apply_partial(&mut self, text: &str, now: Instant) -> FluencyMetrics {
        self.accumulator.ingest_partial(text, now);
        self.metrics = FluencyMetrics::live(self.accumulator.snapshot(), now);
        self.metrics
    }

    /// Finalize metrics and record the learner's line
    pub fn finish_turn(&mut self, now: Instant) -> Message {
        self.metrics = FluencyMetrics::finalize(self.accumulator.snapshot(), now);
        let message = Message {
            role: Role::Learner,
            text: self.accumulator.snapshot().current_text.trim().to_string(),
            at: Utc::now(),
            metrics: Some(self.metrics),
        };
        self.history.push(message.clone());
        message
    }

    pub fn snapshot(&self) -> &UtteranceSnapshot {
        self.accumulator.snapshot()
    }

    pub fn metrics(&self) -> FluencyMetrics {
        self.metrics
    }

    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            history: self.history.clone(),
            language: self.language.clone(),
            level: self.level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utterance::DEFAULT_PAUSE_THRESHOLD;

    #[test]
    fn test_turn_appends_learner_line_with_metrics() {
        let mut context =
            TurnContext::new("es".to_string(), "A2".to_string(), DEFAULT_PAUSE_THRESHOLD);
        context.push_assistant("Hola, ¿qué tal?");

        let t0 = Instant::now();
        context.begin_turn(t0);
        context.apply_partial("Muy", t0 + Duration::from_millis(200));
        context.apply_partial("Muy bien gracias ", t0 + Duration::from_millis(600));
        let message = context.finish_turn(t0 + Duration::from_secs(2));

        assert_eq!(message.role, Role::Learner);
        assert_eq!(message.text, "Muy bien gracias");
        assert!(message.metrics.unwrap().confidence_score >= 5.0);

        let request = context.generation_request();
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.language, "es");
        assert_eq!(request.level, "A2");
    }

    #[test]
    fn test_begin_turn_clears_utterance_only() {
        let mut context =
            TurnContext::new("fr".to_string(), "B1".to_string(), DEFAULT_PAUSE_THRESHOLD);
        let t0 = Instant::now();
        context.begin_turn(t0);
        context.apply_partial("bonjour", t0);
        context.finish_turn(t0 + Duration::from_secs(1));

        context.begin_turn(t0 + Duration::from_secs(5));
        assert!(context.snapshot().is_empty());
        assert_eq!(context.metrics(), FluencyMetrics::default());
        assert_eq!(context.history().len(), 1);
    }
}
