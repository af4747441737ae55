//! The per-frame control loop.
//!
//! A session moves through `AwaitingFirstFrame -> Initialized -> Running ->
//! Terminated`. Each `step` fully processes one frame (read, track, annotate,
//! record, write, present, poll for cancellation) before returning, so the
//! loop is deterministic and can be driven frame by frame in tests.

use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use opencv::core::{Mat, Scalar};

use crate::config::Config;
use crate::error::{Result, TrackError};
use crate::metrics::MetricsRecorder;
use crate::presenter::{Presenter, RoiSelector};
use crate::sink::FrameSink;
use crate::source::FrameSource;
use crate::track::{BoundingBox, FrameRecord, TrackingResult};
use crate::tracker::Tracker;
use crate::visualization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstFrame,
    Initialized,
    Running,
    Terminated,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingFirstFrame => "awaiting first frame",
            Phase::Initialized => "initialized",
            Phase::Running => "running",
            Phase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why the loop stopped. Only `Failed` follows an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    EndOfStream,
    Cancelled,
    /// A frame could not be processed; `step` returned the error.
    Failed,
}

/// Result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Frame { index: u64, result: TrackingResult },
    Finished(EndReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub frames: u64,
    pub average_fps: f64,
    pub end: EndReason,
    pub last_known: Option<BoundingBox>,
    pub history: Vec<FrameRecord>,
}

#[derive(Debug, Clone, Copy)]
struct AnnotationStyle {
    target: Scalar,
    failure: Scalar,
    show_fps: bool,
}

impl AnnotationStyle {
    fn from_config(config: &Config) -> Self {
        Self {
            target: visualization::color(config.target_color),
            failure: visualization::color(config.failure_color),
            show_fps: config.show_fps,
        }
    }
}

/// One tracking run over one source with one tracker.
pub struct TrackingSession<T, S, K, P> {
    tracker: T,
    source: S,
    sink: K,
    presenter: P,
    style: AnnotationStyle,
    clock: Box<dyn FnMut() -> Instant>,
    phase: Phase,
    frame_index: u64,
    metrics: MetricsRecorder,
    last_known: Option<BoundingBox>,
    target_lost: bool,
    history: Option<Vec<FrameRecord>>,
    end: Option<EndReason>,
    average_fps: f64,
}

impl<T, S, K, P> TrackingSession<T, S, K, P>
where
    T: Tracker,
    S: FrameSource,
    K: FrameSink,
    P: Presenter,
{
    pub fn new(tracker: T, source: S, sink: K, presenter: P, config: &Config) -> Self {
        Self {
            tracker,
            source,
            sink,
            presenter,
            style: AnnotationStyle::from_config(config),
            clock: Box::new(Instant::now),
            phase: Phase::AwaitingFirstFrame,
            frame_index: 0,
            metrics: MetricsRecorder::new(),
            last_known: None,
            target_lost: false,
            history: None,
            end: None,
            average_fps: 0.0,
        }
    }

    /// Keep a `FrameRecord` for every processed frame.
    pub fn with_history(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    /// Replace the wall clock used for throughput measurement.
    pub fn with_clock(mut self, clock: impl FnMut() -> Instant + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_known(&self) -> Option<BoundingBox> {
        self.last_known
    }

    /// Frames processed by the loop so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(TrackError::InvalidState {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        Ok(())
    }

    /// Reads the first frame, asks `selector` for the target and seeds the
    /// tracker. Any failure here is fatal for the run; the sink, the source
    /// and the presenter are released before the error is returned.
    pub fn initialize<R: RoiSelector>(&mut self, selector: &mut R) -> Result<BoundingBox> {
        self.expect_phase(Phase::AwaitingFirstFrame)?;
        match self.seed(selector) {
            Ok(roi) => {
                info!("Tracker initialized on region {}", roi);
                self.last_known = Some(roi);
                self.phase = Phase::Initialized;
                Ok(roi)
            }
            Err(e) => {
                // The original error is what the caller needs.
                let _ = self.release_all();
                Err(e)
            }
        }
    }

    fn seed<R: RoiSelector>(&mut self, selector: &mut R) -> Result<BoundingBox> {
        let frame = self
            .source
            .read_frame()
            .ok_or_else(|| TrackError::SourceUnreadable(self.source.label()))?;
        let roi = selector.select_roi(&frame)?;
        if !self.tracker.init(&frame, roi)? {
            return Err(TrackError::TrackerInitFailed(roi));
        }
        Ok(roi)
    }

    /// Attempts every release, logs each failure and returns the first one.
    fn release_all(&mut self) -> Result<()> {
        let results = [
            ("output", self.sink.finish()),
            ("source", self.source.release()),
            ("display", self.presenter.close()),
        ];
        let mut first = None;
        for (what, result) in results {
            if let Err(e) = result {
                warn!("failed to release {}: {}", what, e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Processes one frame, or terminates the session when the source is
    /// exhausted. A frame that triggers cancellation is still returned, with
    /// the session already terminated.
    ///
    /// An error while processing a frame terminates the session as `Failed`
    /// and releases all resources before it is returned.
    pub fn step(&mut self) -> Result<Step> {
        match self.phase {
            Phase::AwaitingFirstFrame => {
                return Err(TrackError::InvalidState {
                    expected: Phase::Initialized.name(),
                    actual: self.phase.name(),
                });
            }
            Phase::Terminated => {
                return Ok(Step::Finished(self.end.unwrap_or(EndReason::EndOfStream)));
            }
            Phase::Initialized => {
                self.metrics = MetricsRecorder::starting_at((self.clock)());
                self.phase = Phase::Running;
                debug!("session running");
            }
            Phase::Running => {}
        }

        match self.process_next() {
            Ok(step) => Ok(step),
            Err(e) => {
                // A release error from `terminate` has already ended the run.
                if self.phase != Phase::Terminated {
                    warn!("frame {} failed: {}", self.frame_index, e);
                    // The frame error takes precedence over release errors.
                    let _ = self.terminate(EndReason::Failed);
                }
                Err(e)
            }
        }
    }

    fn process_next(&mut self) -> Result<Step> {
        let Some(mut frame) = self.source.read_frame() else {
            info!("End of video or cannot capture frame.");
            return self.terminate(EndReason::EndOfStream);
        };

        let index = self.frame_index;
        let result = self.tracker.update(&frame)?;
        self.annotate(&mut frame, index, result)?;

        self.sink.write_frame(&frame)?;
        self.presenter.present(&frame)?;
        if let Some(history) = self.history.as_mut() {
            history.push(FrameRecord {
                frame_index: index,
                tracked: result.is_tracked(),
                bbox: self.last_known,
            });
        }
        self.frame_index += 1;

        if self.presenter.poll_cancel()? {
            self.terminate(EndReason::Cancelled)?;
        }
        Ok(Step::Frame { index, result })
    }

    fn annotate(&mut self, frame: &mut Mat, index: u64, result: TrackingResult) -> Result<()> {
        match result {
            TrackingResult::Tracked(bbox) => {
                if self.target_lost {
                    info!("frame {}: target reacquired at {}", index, bbox);
                }
                self.target_lost = false;
                self.last_known = Some(bbox);
                debug!("frame {}: tracked {}", index, bbox);
                visualization::draw_target(frame, bbox, self.style.target)?;
            }
            TrackingResult::Lost => {
                if !self.target_lost {
                    warn!("frame {}: tracking failed", index);
                }
                self.target_lost = true;
                debug!("frame {}: lost, keeping {:?}", index, self.last_known);
                visualization::draw_failure(frame, self.style.failure)?;
            }
        }

        self.metrics.record_frame();
        let now = (self.clock)();
        if let Some(fps) = self.metrics.maybe_sample_at(now) {
            debug!("throughput sample: {:.1} fps", fps);
        }
        if self.style.show_fps {
            if let Some(fps) = self.metrics.latest() {
                visualization::draw_frame_info(frame, index, fps)?;
            }
        }
        Ok(())
    }

    fn terminate(&mut self, reason: EndReason) -> Result<Step> {
        self.phase = Phase::Terminated;
        self.end = Some(reason);
        let now = (self.clock)();
        self.average_fps = self.metrics.finalize_at(now);

        let released = self.release_all();
        info!(
            "Session ended ({:?}) after {} frames, average {:.2} fps",
            reason,
            self.metrics.frame_count(),
            self.average_fps
        );
        released?;
        Ok(Step::Finished(reason))
    }

    /// Steps until the session terminates and returns its summary.
    pub fn run(&mut self) -> Result<SessionReport> {
        while self.phase != Phase::Terminated {
            self.step()?;
        }
        Ok(self.report())
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            frames: self.metrics.frame_count(),
            average_fps: self.average_fps,
            end: self.end.unwrap_or(EndReason::EndOfStream),
            last_known: self.last_known,
            history: self.history.clone().unwrap_or_default(),
        }
    }
}
