use std::time::{Duration, Instant};

/// Minimum gap between two rolling throughput samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Frame counter plus wall-clock bookkeeping for throughput reporting.
///
/// The rolling sample is a low-frequency display value: it is the average
/// since `start`, refreshed at most once per `SAMPLE_INTERVAL`.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    frame_count: u64,
    start: Instant,
    last_sample: Instant,
    latest: Option<f64>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            frame_count: 0,
            start,
            last_sample: start,
            latest: None,
        }
    }

    /// Called once per loop iteration, tracked or not.
    pub fn record_frame(&mut self) {
        self.frame_count += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn maybe_sample(&mut self) -> Option<f64> {
        self.maybe_sample_at(Instant::now())
    }

    /// Returns `frames / elapsed` when at least one interval has passed since
    /// the previous sample, and moves the sample marker to `now`.
    pub fn maybe_sample_at(&mut self, now: Instant) -> Option<f64> {
        if now.saturating_duration_since(self.last_sample) < SAMPLE_INTERVAL {
            return None;
        }
        self.last_sample = now;
        let rate = rate(self.frame_count, now.saturating_duration_since(self.start));
        self.latest = Some(rate);
        Some(rate)
    }

    /// Most recent rolling sample, reused for display between samples.
    pub fn latest(&self) -> Option<f64> {
        self.latest
    }

    pub fn finalize(&self) -> f64 {
        self.finalize_at(Instant::now())
    }

    /// Overall average throughput. Zero for runs too short to measure.
    pub fn finalize_at(&self, now: Instant) -> f64 {
        rate(self.frame_count, now.saturating_duration_since(self.start))
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn rate(frames: u64, elapsed: Duration) -> f64 {
    if elapsed < Duration::from_millis(1) {
        return 0.0;
    }
    frames as f64 / elapsed.as_secs_f64()
}
