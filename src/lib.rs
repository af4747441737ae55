pub mod config;
pub mod error;
pub mod metrics;
pub mod presenter;
pub mod session;
pub mod sink;
pub mod source;
pub mod track;
pub mod tracker;
pub mod visualization;

// Re-export main types
pub use crate::config::{Config, SessionOptions};
pub use crate::error::{Result, TrackError};
pub use crate::metrics::MetricsRecorder;
pub use crate::session::{EndReason, Phase, SessionReport, Step, TrackingSession};
pub use crate::track::{BoundingBox, FrameRecord, TrackingResult};
pub use crate::tracker::{StrategyKind, Tracker, TrackerStrategy};
