//! Fluency metrics derived from an utterance snapshot
//!
//! Metrics are recomputed from scratch on every transcript update. The pause
//! statistics and the confidence score are only filled in when the turn is
//! finalized. The thresholds below are a fixed contract so scores stay
//! comparable across clients.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::accumulator::UtteranceSnapshot;

const BASE_CONFIDENCE: f64 = 5.0;
const MAX_CONFIDENCE: f64 = 10.0;
const FAST_SPEECH_WPM: f64 = 120.0;
const MAX_PAUSES_PER_MINUTE: f64 = 5.0;
const LONG_RUN_SECS: f64 = 10.0;
const DIVERSE_VOCABULARY: f64 = 0.5;
const LOW_FILLER_USAGE: f64 = 0.1;

/// Snapshot of the learner's fluency for one turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FluencyMetrics {
    pub words_per_minute: f64,
    /// Pauses per minute
    pub pause_frequency: f64,
    /// Seconds
    pub average_pause_duration: f64,
    /// Filler words per word, in [0, 1]
    pub filler_word_usage: f64,
    /// Unique words per word, in [0, 1]
    pub vocabulary_diversity: f64,
    /// Words per sentence
    pub sentence_complexity: f64,
    /// In [0, 10]
    pub confidence_score: f64,
    /// Longest pause-free stretch, in seconds
    pub continuous_speech_duration: f64,
}

impl FluencyMetrics {
    /// Metrics while the learner is still speaking
    pub fn live(snapshot: &UtteranceSnapshot, now: Instant) -> Self {
        let words = snapshot.word_count;
        Self {
            words_per_minute: words_per_minute(words, elapsed(snapshot, now)),
            pause_frequency: 0.0,
            average_pause_duration: 0.0,
            filler_word_usage: ratio(snapshot.filler_count, words).clamp(0.0, 1.0),
            vocabulary_diversity: ratio(snapshot.unique_word_count, words).clamp(0.0, 1.0),
            sentence_complexity: words as f64
                / sentence_count(&snapshot.current_text).max(1) as f64,
            confidence_score: 0.0,
            continuous_speech_duration: snapshot.continuous_speech().as_secs_f64(),
        }
    }

    /// Final metrics once the turn has ended
    pub fn finalize(snapshot: &UtteranceSnapshot, now: Instant) -> Self {
        let mut metrics = Self::live(snapshot, now);
        let minutes = elapsed(snapshot, now).as_secs_f64() / 60.0;

        metrics.pause_frequency = if snapshot.pause_count == 0 || minutes <= 0.0 {
            0.0
        } else {
            snapshot.pause_count as f64 / minutes
        };
        metrics.average_pause_duration =
            snapshot.total_pause_duration.as_secs_f64() / snapshot.pause_count.max(1) as f64;
        metrics.confidence_score = confidence_score(&metrics);
        metrics
    }
}

/// Additive confidence heuristic, clamped to [0, 10]
pub fn confidence_score(metrics: &FluencyMetrics) -> f64 {
    let checks = [
        metrics.words_per_minute > FAST_SPEECH_WPM,
        metrics.pause_frequency < MAX_PAUSES_PER_MINUTE,
        metrics.continuous_speech_duration > LONG_RUN_SECS,
        metrics.vocabulary_diversity > DIVERSE_VOCABULARY,
        metrics.filler_word_usage < LOW_FILLER_USAGE,
    ];
    let met = checks.iter().filter(|&&ok| ok).count() as f64;
    (BASE_CONFIDENCE + met).clamp(0.0, MAX_CONFIDENCE)
}

/// Words per minute, 0 when no time has elapsed
pub fn words_per_minute(word_count: usize, elapsed: Duration) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    word_count as f64 / minutes
}

/// Non-blank segments between `.`, `!` and `?`
pub fn sentence_count(text: &str) -> usize {
    text.split(|c| matches!(c, '.' | '!' | '?'))
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

fn elapsed(snapshot: &UtteranceSnapshot, now: Instant) -> Duration {
    now.saturating_duration_since(snapshot.start_time)
}

fn ratio(part: usize, whole: usize) -> f64 {
    part as f64 / whole.max(1) as f64
}
