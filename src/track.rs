use std::fmt;

use opencv::core::{Rect, Rect2d};
use serde::{Deserialize, Serialize};

/// Axis-aligned target region in integer pixels: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Negative sizes are clamped to zero.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: width.max(0),
            height: height.max(0),
        }
    }

    /// A box with no area cannot seed a tracker.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn to_rect2d(self) -> Rect2d {
        Rect2d::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }

    /// Truncates towards zero, the same way the drawing code does.
    pub fn from_rect2d(rect: Rect2d) -> Self {
        Self::new(
            rect.x as i32,
            rect.y as i32,
            rect.width as i32,
            rect.height as i32,
        )
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = String;

    /// Parses `x,y,w,h`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid region '{}': {}", s, e))?;
        match parts.as_slice() {
            [x, y, w, h] if *w >= 0 && *h >= 0 => Ok(Self::new(*x, *y, *w, *h)),
            [_, _, _, _] => Err(format!("invalid region '{}': negative size", s)),
            _ => Err(format!("invalid region '{}': expected x,y,w,h", s)),
        }
    }
}

/// Outcome of one `update` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingResult {
    Tracked(BoundingBox),
    Lost,
}

impl TrackingResult {
    pub fn is_tracked(&self) -> bool {
        matches!(self, TrackingResult::Tracked(_))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            TrackingResult::Tracked(bbox) => Some(*bbox),
            TrackingResult::Lost => None,
        }
    }
}

/// One line of the per-frame tracking log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub tracked: bool,
    /// Last known box at this frame, kept across `Lost` frames.
    pub bbox: Option<BoundingBox>,
}
