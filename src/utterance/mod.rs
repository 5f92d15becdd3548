//! Learner speech analysis
//!
//! This module provides:
//! - `UtteranceAccumulator` for folding partial transcripts into running counts
//! - `FluencyMetrics` derived from those counts
//! - Shadow-speaking scoring by word overlap

mod accumulator;
mod fluency;
pub mod shadow;

pub use accumulator::{
    normalize_token, tokenize, UtteranceAccumulator, UtteranceSnapshot, DEFAULT_PAUSE_THRESHOLD,
    FILLER_PHRASES, FILLER_WORDS,
};
pub use fluency::{confidence_score, sentence_count, words_per_minute, FluencyMetrics};
