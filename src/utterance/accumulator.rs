use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Single-word fillers counted against the learner
pub const FILLER_WORDS: &[&str] = &["um", "uh", "like", "so", "actually", "basically", "well"];

/// Multi-word fillers, each occurrence counted once
pub const FILLER_PHRASES: &[(&str, &str)] = &[("you", "know")];

/// Gap between transcript updates that counts as a pause
pub const DEFAULT_PAUSE_THRESHOLD: Duration = Duration::from_millis(500);

/// Case-folded comparison form of a token, with edge punctuation trimmed
///
/// Tokens made only of punctuation keep their lowercase form so they still
/// count as distinct words.
pub fn normalize_token(token: &str) -> String {
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        token.to_lowercase()
    } else {
        trimmed.to_lowercase()
    }
}

/// Whitespace tokens of `text` in comparison form
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(normalize_token).collect()
}

/// Running state of the learner's current utterance
#[derive(Debug, Clone)]
pub struct UtteranceSnapshot {
    /// Latest (possibly partial) transcript
    pub current_text: String,
    pub word_count: usize,
    /// Distinct words, case folded
    pub unique_word_count: usize,
    pub filler_count: usize,
    /// When the listening turn started
    pub start_time: Instant,
    /// When the last transcript update arrived
    pub last_update_time: Option<Instant>,
    pub pause_count: usize,
    pub total_pause_duration: Duration,
    /// Longest closed pause-free stretch of speech
    pub longest_run: Duration,
    /// Start of the currently open pause-free stretch
    pub run_start: Option<Instant>,
}

impl UtteranceSnapshot {
    pub fn new(start_time: Instant) -> Self {
        Self {
            current_text: String::new(),
            word_count: 0,
            unique_word_count: 0,
            filler_count: 0,
            start_time,
            last_update_time: None,
            pause_count: 0,
            total_pause_duration: Duration::ZERO,
            longest_run: Duration::ZERO,
            run_start: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    /// Longest pause-free stretch so far, including the open one
    pub fn continuous_speech(&self) -> Duration {
        let open = match (self.run_start, self.last_update_time) {
            (Some(start), Some(last)) => last.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        self.longest_run.max(open)
    }
}

/// Consumes partial transcripts for one listening turn
#[derive(Debug, Clone)]
pub struct UtteranceAccumulator {
    pause_threshold: Duration,
    snapshot: UtteranceSnapshot,
}

impl UtteranceAccumulator {
    pub fn new(pause_threshold: Duration, now: Instant) -> Self {
        Self {
            pause_threshold,
            snapshot: UtteranceSnapshot::new(now),
        }
    }

    /// Apply the latest partial transcript
    ///
    /// Recognizers resend the whole utterance so far, so counts are derived
    /// from `text` alone rather than added up.
    pub fn ingest_partial(&mut self, text: &str, now: Instant) {
        let pause_threshold = self.pause_threshold;
        let s = &mut self.snapshot;

        if let Some(last) = s.last_update_time {
            let gap = now.saturating_duration_since(last);
            if gap >= pause_threshold {
                if let Some(start) = s.run_start {
                    s.longest_run = s.longest_run.max(last.saturating_duration_since(start));
                }
                s.pause_count += 1;
                s.total_pause_duration += gap;
                s.run_start = Some(now);
            }
        }
        if s.run_start.is_none() {
            s.run_start = Some(now);
        }

        let tokens = tokenize(text);
        s.current_text = text.to_string();
        s.word_count = tokens.len();
        s.unique_word_count = tokens.iter().collect::<HashSet<_>>().len();
        s.filler_count = count_fillers(&tokens);
        s.last_update_time = Some(now);
    }

    pub fn reset(&mut self, now: Instant) {
        self.snapshot = UtteranceSnapshot::new(now);
    }

    pub fn snapshot(&self) -> &UtteranceSnapshot {
        &self.snapshot
    }

    pub fn pause_threshold(&self) -> Duration {
        self.pause_threshold
    }
}

fn count_fillers(tokens: &[String]) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < tokens.len() {
        let phrase = tokens.get(i + 1).and_then(|next| {
            FILLER_PHRASES
                .iter()
                .find(|(a, b)| tokens[i] == *a && next == b)
        });
        if phrase.is_some() {
            count += 1;
            i += 2;
            continue;
        }
        if FILLER_WORDS.contains(&tokens[i].as_str()) {
            count += 1;
        }
        i += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator() -> (UtteranceAccumulator, Instant) {
        let t0 = Instant::now();
        (UtteranceAccumulator::new(DEFAULT_PAUSE_THRESHOLD, t0), t0)
    }

    #[test]
    fn test_counts_words_and_unique_words() {
        let (mut acc, t0) = accumulator();
        acc.ingest_partial("The cat saw the  other Cat.", t0 + Duration::from_millis(100));

        let s = acc.snapshot();
        assert_eq!(s.word_count, 6);
        assert_eq!(s.unique_word_count, 4);
        assert!(s.unique_word_count <= s.word_count);
        assert_eq!(s.current_text, "The cat saw the  other Cat.");
    }

    #[test]
    fn test_garbage_input_is_zero_counts() {
        let (mut acc, t0) = accumulator();
        acc.ingest_partial("   \t\n ", t0);

        let s = acc.snapshot();
        assert_eq!(s.word_count, 0);
        assert_eq!(s.unique_word_count, 0);
        assert_eq!(s.filler_count, 0);
        assert!(s.is_empty());
    }

    #[test]
    fn test_fillers_including_phrase() {
        let (mut acc, t0) = accumulator();
        acc.ingest_partial("Um, I went, you know, to the uh park", t0);
        assert_eq!(acc.snapshot().filler_count, 3);
    }

    #[test]
    fn test_pause_detected_from_update_gap() {
        let (mut acc, t0) = accumulator();
        acc.ingest_partial("I", t0 + Duration::from_millis(200));
        acc.ingest_partial("I went", t0 + Duration::from_millis(400));
        acc.ingest_partial("I went home", t0 + Duration::from_millis(1200));

        let s = acc.snapshot();
        assert_eq!(s.pause_count, 1);
        assert_eq!(s.total_pause_duration, Duration::from_millis(800));
        assert_eq!(s.continuous_speech(), Duration::from_millis(200));
    }

    #[test]
    fn test_reset_then_reingest_matches_fresh() {
        let (mut used, t0) = accumulator();
        used.ingest_partial("so like hello", t0);
        used.ingest_partial("so like hello there friend", t0 + Duration::from_secs(2));

        let t1 = t0 + Duration::from_secs(5);
        used.reset(t1);
        used.ingest_partial("so like hello", t1 + Duration::from_millis(300));

        let mut fresh = UtteranceAccumulator::new(DEFAULT_PAUSE_THRESHOLD, t1);
        fresh.ingest_partial("so like hello", t1 + Duration::from_millis(300));

        let (a, b) = (used.snapshot(), fresh.snapshot());
        assert_eq!(a.word_count, b.word_count);
        assert_eq!(a.unique_word_count, b.unique_word_count);
        assert_eq!(a.filler_count, b.filler_count);
        assert_eq!(a.pause_count, b.pause_count);
        assert_eq!(a.total_pause_duration, b.total_pause_duration);
        assert_eq!(a.start_time, b.start_time);
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Hello,"), "hello");
        assert_eq!(normalize_token("don't"), "don't");
        assert_eq!(normalize_token("..."), "...");
    }
}
