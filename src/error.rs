use std::path::PathBuf;

use thiserror::Error;

use crate::track::BoundingBox;

/// Everything that can stop a tracking run.
///
/// Losing the target is deliberately absent: that is a per-frame
/// `TrackingResult::Lost`, never an error.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("unsupported tracker kind '{0}' (expected one of BOOSTING, CSRT, MIL)")]
    UnsupportedStrategy(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("could not open video source '{0}'")]
    SourceUnopenable(String),

    #[error("cannot read from video source '{0}'")]
    SourceUnreadable(String),

    #[error("could not open output video {0:?}")]
    SinkUnopenable(PathBuf),

    #[error("tracker failed to initialize on region {0}")]
    TrackerInitFailed(BoundingBox),

    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    OpenCv(#[from] opencv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackError>;
