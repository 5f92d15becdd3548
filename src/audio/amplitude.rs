// Amplitude monitor for live capture feedback
//
// Turns each captured frame into a loudness level in [0, 1] and publishes it
// on a watch channel. Listeners (UI meters, activity heuristics) only ever
// read the published value.

use std::sync::Arc;
use tokio::sync::watch;

use super::backend::AudioFrame;

pub struct AmplitudeMonitor {
    /// Weight of the previous level when smoothing, in [0, 1)
    smoothing: f32,
    level: f32,
    tx: Arc<watch::Sender<f32>>,
}

impl AmplitudeMonitor {
    pub fn new(smoothing: f32) -> Self {
        let (tx, _) = watch::channel(0.0);
        Self::publishing_to(smoothing, Arc::new(tx))
    }

    /// Monitor that publishes on an existing channel
    ///
    /// A session keeps one level channel for its whole lifetime and hands it
    /// to the monitor of each capture period.
    pub fn publishing_to(smoothing: f32, tx: Arc<watch::Sender<f32>>) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 0.99),
            level: 0.0,
            tx,
        }
    }

    /// Observe a frame and publish its level
    ///
    /// Level is the mean absolute amplitude of the frame. Empty frames yield 0.
    pub fn observe(&mut self, frame: &AudioFrame) -> f32 {
        let raw = mean_abs_amplitude(frame);
        self.level = self.smoothing * self.level + (1.0 - self.smoothing) * raw;
        self.tx.send_replace(self.level);
        self.level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn is_active(&self, threshold: f32) -> bool {
        self.level > threshold
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.tx.subscribe()
    }

    /// Drop back to silence (capture stopped)
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.tx.send_replace(0.0);
    }
}

impl Default for AmplitudeMonitor {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn mean_abs_amplitude(frame: &AudioFrame) -> f32 {
    if frame.samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.normalized().map(f32::abs).sum();
    (sum / frame.samples.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_empty_frame_is_silent() {
        let mut monitor = AmplitudeMonitor::default();
        assert_eq!(monitor.observe(&frame(vec![])), 0.0);
    }

    #[test]
    fn test_mean_absolute_amplitude() {
        let mut monitor = AmplitudeMonitor::default();
        let level = monitor.observe(&frame(vec![16384, -16384, 0, 0]));
        assert!((level - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_full_scale_stays_in_range() {
        let mut monitor = AmplitudeMonitor::default();
        let level = monitor.observe(&frame(vec![i16::MIN; 160]));
        assert!(level <= 1.0);
        assert!(level > 0.99);
    }

    #[test]
    fn test_level_is_published() {
        let mut monitor = AmplitudeMonitor::default();
        let rx = monitor.subscribe();
        monitor.observe(&frame(vec![8192; 10]));
        assert!((*rx.borrow() - 0.25).abs() < 1e-6);
        monitor.reset();
        assert_eq!(*rx.borrow(), 0.0);
    }

    #[test]
    fn test_smoothing_lags_behind_raw_level() {
        let mut monitor = AmplitudeMonitor::new(0.5);
        let level = monitor.observe(&frame(vec![16384; 10]));
        assert!((level - 0.25).abs() < 1e-6);
        assert!(monitor.is_active(0.1));
        assert!(!monitor.is_active(0.3));
    }
}
