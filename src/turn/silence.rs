//! End-of-turn detection
//!
//! The learner is done speaking once no new partial transcript has arrived
//! for the quiet period. Each update pushes the deadline forward; only the
//! most recent deadline can fire, and it fires at most once.

use std::future;
use std::time::Duration;
use tokio::time::{self, Instant};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1500);

#[derive(Debug)]
pub struct SilenceDetector {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl SilenceDetector {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Schedule the deadline at `now + quiet`, replacing any armed one
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    pub fn on_transcript_update(&mut self, now: Instant) {
        self.arm(now);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Consume the deadline if it has passed
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Resolve when the armed deadline passes; pending forever while disarmed
    ///
    /// Cancel safe: dropping the future before it resolves leaves the deadline
    /// armed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => future::pending().await,
        }
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}
