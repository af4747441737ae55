use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::{info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::error::{Result, TrackError};

/// Where frames come from: a video file or a numbered capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    File(PathBuf),
    Device(i32),
}

impl FromStr for SourceId {
    type Err = TrackError;

    /// All-digit strings select a device index, anything else is a path.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TrackError::InvalidConfig("video source is empty".into()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = s.parse::<i32>() {
                return Ok(SourceId::Device(index));
            }
        }
        Ok(SourceId::File(PathBuf::from(s)))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::File(path) => write!(f, "{}", path.display()),
            SourceId::Device(index) => write!(f, "{}", index),
        }
    }
}

/// Stream properties, queried once after open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMetadata {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
}

impl SourceMetadata {
    /// Webcams commonly report 0 fps; recorders still need a rate.
    pub fn effective_fps(&self, fallback: f64) -> f64 {
        if self.fps.is_finite() && self.fps > 0.0 {
            self.fps
        } else {
            fallback
        }
    }
}

/// A finite, lazily produced sequence of frames. `None` marks end of stream
/// or a device failure; both end the run the same way.
pub trait FrameSource {
    fn read_frame(&mut self) -> Option<Mat>;

    fn metadata(&self) -> SourceMetadata;

    /// Name used in diagnostics.
    fn label(&self) -> String {
        "video source".to_string()
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `VideoCapture`-backed source for files and devices.
pub struct VideoSource {
    id: SourceId,
    capture: VideoCapture,
    metadata: SourceMetadata,
    read_retries: u32,
}

impl VideoSource {
    pub fn open(id: &SourceId, read_retries: u32) -> Result<Self> {
        let capture = match id {
            SourceId::File(path) => VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY),
            SourceId::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
        }
        .map_err(|_| TrackError::SourceUnopenable(id.to_string()))?;
        if !capture.is_opened()? {
            return Err(TrackError::SourceUnopenable(id.to_string()));
        }

        let metadata = SourceMetadata {
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
            fps: capture.get(videoio::CAP_PROP_FPS)?,
        };
        info!("Opened video source {}", id);
        info!("  Resolution: {}x{}", metadata.width, metadata.height);
        info!("  FPS: {:.2}", metadata.fps);

        Ok(Self {
            id: id.clone(),
            capture,
            metadata,
            read_retries,
        })
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    fn read_once(&mut self) -> Option<Mat> {
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => Some(frame),
            Ok(_) => None,
            Err(e) => {
                warn!("frame read from {} failed: {}", self.id, e);
                None
            }
        }
    }
}

/// Calls `read` up to `retries + 1` times and returns the first frame.
pub(crate) fn read_with_retries<F>(retries: u32, label: &str, mut read: F) -> Option<Mat>
where
    F: FnMut() -> Option<Mat>,
{
    for attempt in 0..=retries {
        if let Some(frame) = read() {
            return Some(frame);
        }
        if attempt < retries {
            warn!("no frame from {}, retrying ({}/{})", label, attempt + 1, retries);
        }
    }
    None
}

impl FrameSource for VideoSource {
    fn read_frame(&mut self) -> Option<Mat> {
        let label = self.id.to_string();
        read_with_retries(self.read_retries, &label, || self.read_once())
    }

    fn metadata(&self) -> SourceMetadata {
        self.metadata
    }

    fn label(&self) -> String {
        self.id.to_string()
    }

    fn release(&mut self) -> Result<()> {
        self.capture.release()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_source_id_parse() {
        assert_eq!("0".parse::<SourceId>().unwrap(), SourceId::Device(0));
        assert_eq!(" 2 ".parse::<SourceId>().unwrap(), SourceId::Device(2));
        assert_eq!(
            "videos/cars.mp4".parse::<SourceId>().unwrap(),
            SourceId::File(PathBuf::from("videos/cars.mp4"))
        );
        // Signed or fractional numbers are paths, not devices.
        assert_eq!("-1".parse::<SourceId>().unwrap(), SourceId::File(PathBuf::from("-1")));
        assert!("".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_effective_fps() {
        let meta = SourceMetadata { width: 640, height: 480, fps: 0.0 };
        assert_relative_eq!(meta.effective_fps(30.0), 30.0);

        let meta = SourceMetadata { fps: f64::NAN, ..meta };
        assert_relative_eq!(meta.effective_fps(25.0), 25.0);

        let meta = SourceMetadata { fps: 59.94, ..meta };
        assert_relative_eq!(meta.effective_fps(30.0), 59.94);
    }

    /// Fails `failures` times, then yields a frame.
    fn flaky(failures: usize, attempts: &mut usize) -> impl FnMut() -> Option<Mat> + '_ {
        move || {
            *attempts += 1;
            (*attempts > failures).then(Mat::default)
        }
    }

    #[test]
    fn test_no_retries_reads_once() {
        let mut attempts = 0;
        assert!(read_with_retries(0, "cam", flaky(0, &mut attempts)).is_some());
        assert_eq!(attempts, 1);

        let mut attempts = 0;
        assert!(read_with_retries(0, "cam", flaky(1, &mut attempts)).is_none());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_retries_until_a_frame_arrives() {
        let mut attempts = 0;
        assert!(read_with_retries(3, "cam", flaky(2, &mut attempts)).is_some());
        assert_eq!(attempts, 3);

        let mut attempts = 0;
        assert!(read_with_retries(3, "cam", flaky(3, &mut attempts)).is_some());
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_retries_exhausted_is_end_of_stream() {
        let mut attempts = 0;
        assert!(read_with_retries(3, "cam", flaky(usize::MAX, &mut attempts)).is_none());
        assert_eq!(attempts, 4);
    }

    #[test]
    fn test_missing_file_is_unopenable() {
        let dir = tempfile::tempdir().unwrap();
        let id = SourceId::File(dir.path().join("does_not_exist.mp4"));
        let err = VideoSource::open(&id, 0).err().unwrap();
        assert!(matches!(err, TrackError::SourceUnopenable(_)));
    }
}
