use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use opencv::{
    core::{Mat, Ptr, Rect, Rect2d},
    prelude::*,
    tracking::{legacy_TrackerBoosting, TrackerCSRT},
    video::TrackerMIL,
};

use crate::error::{Result, TrackError};
use crate::track::{BoundingBox, TrackingResult};

/// The closed set of tracking algorithms a session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Boosting,
    Csrt,
    Mil,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::Boosting, StrategyKind::Csrt, StrategyKind::Mil];

    /// Canonical upper-case name, as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Boosting => "BOOSTING",
            StrategyKind::Csrt => "CSRT",
            StrategyKind::Mil => "MIL",
        }
    }

    /// Lower-case name used in output file names.
    pub fn slug(&self) -> &'static str {
        match self {
            StrategyKind::Boosting => "boosting",
            StrategyKind::Csrt => "csrt",
            StrategyKind::Mil => "mil",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TrackError::UnsupportedStrategy(s.to_string()))
    }
}

/// Single-target tracking capability consumed by the session loop.
///
/// `init` is called exactly once before any `update`. Returning `Ok(false)`
/// from `init` means the frame or region was rejected.
pub trait Tracker {
    fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<bool>;

    fn update(&mut self, frame: &Mat) -> Result<TrackingResult>;
}

/// OpenCV-backed tracker, one variant per `StrategyKind`.
pub enum TrackerStrategy {
    Boosting(Ptr<legacy_TrackerBoosting>),
    Csrt(Ptr<TrackerCSRT>),
    Mil(Ptr<TrackerMIL>),
}

impl TrackerStrategy {
    /// Builds the tracker for `kind` with the library's default parameters.
    pub fn create(kind: StrategyKind) -> Result<Self> {
        let strategy = match kind {
            StrategyKind::Boosting => TrackerStrategy::Boosting(legacy_TrackerBoosting::create_def()?),
            StrategyKind::Csrt => TrackerStrategy::Csrt(TrackerCSRT::create_def()?),
            StrategyKind::Mil => TrackerStrategy::Mil(TrackerMIL::create_def()?),
        };
        debug!("created {} tracker", kind);
        Ok(strategy)
    }

    /// Resolves a tracker name and builds it. Unknown names fail with
    /// `UnsupportedStrategy` before anything touches OpenCV.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::create(name.parse()?)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            TrackerStrategy::Boosting(_) => StrategyKind::Boosting,
            TrackerStrategy::Csrt(_) => StrategyKind::Csrt,
            TrackerStrategy::Mil(_) => StrategyKind::Mil,
        }
    }
}

impl Tracker for TrackerStrategy {
    fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<bool> {
        if frame.empty() || roi.is_empty() {
            return Ok(false);
        }
        let outcome = match self {
            TrackerStrategy::Boosting(t) => t.init(frame, roi.to_rect2d()),
            TrackerStrategy::Csrt(t) => t.init(frame, roi.to_rect()).map(|_| true),
            TrackerStrategy::Mil(t) => t.init(frame, roi.to_rect()).map(|_| true),
        };
        match outcome {
            Ok(ok) => Ok(ok),
            Err(e) => {
                // OpenCV raises on regions outside the frame; that is a rejected box.
                warn!("{} tracker rejected region {}: {}", self.kind(), roi, e);
                Ok(false)
            }
        }
    }

    fn update(&mut self, frame: &Mat) -> Result<TrackingResult> {
        let outcome = match self {
            TrackerStrategy::Boosting(t) => {
                let mut region = Rect2d::default();
                t.update(frame, &mut region)
                    .map(|ok| ok.then(|| BoundingBox::from_rect2d(region)))
            }
            TrackerStrategy::Csrt(t) => {
                let mut region = Rect::default();
                t.update(frame, &mut region)
                    .map(|ok| ok.then(|| BoundingBox::from(region)))
            }
            TrackerStrategy::Mil(t) => {
                let mut region = Rect::default();
                t.update(frame, &mut region)
                    .map(|ok| ok.then(|| BoundingBox::from(region)))
            }
        };
        match outcome {
            Ok(Some(bbox)) => Ok(TrackingResult::Tracked(bbox)),
            Ok(None) => Ok(TrackingResult::Lost),
            Err(e) => {
                warn!("{} tracker update failed, treating as lost: {}", self.kind(), e);
                Ok(TrackingResult::Lost)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Size, CV_8UC3};

    #[test]
    fn test_kind_parse() {
        assert_eq!("CSRT".parse::<StrategyKind>().unwrap(), StrategyKind::Csrt);
        assert_eq!("mil".parse::<StrategyKind>().unwrap(), StrategyKind::Mil);
        assert_eq!(" Boosting ".parse::<StrategyKind>().unwrap(), StrategyKind::Boosting);
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = "UNKNOWN".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, TrackError::UnsupportedStrategy(ref name) if name == "UNKNOWN"));

        // KCF exists in OpenCV but is not one of ours.
        assert!(TrackerStrategy::from_name("KCF").is_err());
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
            assert_eq!(kind.slug(), kind.name().to_lowercase());
        }
    }

    #[test]
    fn test_factory_builds_requested_variant() {
        for kind in StrategyKind::ALL {
            let strategy = TrackerStrategy::create(kind).unwrap();
            assert_eq!(strategy.kind(), kind);
        }
    }

    #[test]
    fn test_init_rejects_empty_inputs() {
        let mut strategy = TrackerStrategy::create(StrategyKind::Csrt).unwrap();
        let frame = Mat::new_size_with_default(
            Size::new(64, 48),
            CV_8UC3,
            Scalar::all(0.0),
        ).unwrap();

        assert!(!strategy.init(&frame, BoundingBox::new(10, 10, 0, 20)).unwrap());
        assert!(!strategy.init(&Mat::default(), BoundingBox::new(10, 10, 20, 20)).unwrap());
    }
}
