use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::VideoWriter,
};

use crate::error::{Result, TrackError};
use crate::source::SourceId;
use crate::tracker::StrategyKind;

/// Receives every processed frame, in capture order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Recording path for a run: `<dir>/<tracker>_<source stem>.<ext>`, or
/// `<dir>/<tracker>_webcam.<ext>` for capture devices.
pub fn output_path(dir: &Path, kind: StrategyKind, source: &SourceId, container: &str) -> PathBuf {
    let stem = match source {
        SourceId::File(path) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string()),
        SourceId::Device(_) => "webcam".to_string(),
    };
    dir.join(format!("{}_{}.{}", kind.slug(), stem, container))
}

/// `VideoWriter`-backed recorder.
pub struct VideoSink {
    path: PathBuf,
    writer: VideoWriter,
    frames_written: u64,
}

impl VideoSink {
    /// Creates the parent directory if needed and opens the writer.
    pub fn open(path: &Path, width: i32, height: i32, fps: f64, fourcc: [char; 4]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let code = VideoWriter::fourcc(fourcc[0], fourcc[1], fourcc[2], fourcc[3])?;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            code,
            fps,
            Size::new(width, height),
            true,
        )
        .map_err(|_| TrackError::SinkUnopenable(path.to_path_buf()))?;
        if !writer.is_opened()? {
            return Err(TrackError::SinkUnopenable(path.to_path_buf()));
        }
        info!("Writing {}x{} @ {:.2} fps to {:?}", width, height, fps, path);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for VideoSink {
    fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        self.writer.write(frame)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.release()?;
        info!("Saved {} frames to {:?}", self.frames_written, self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for_file_source() {
        let source = SourceId::File(PathBuf::from("/data/clips/street.avi"));
        let path = output_path(Path::new("output"), StrategyKind::Csrt, &source, "mp4");
        assert_eq!(path, PathBuf::from("output/csrt_street.mp4"));
    }

    #[test]
    fn test_output_path_for_device_source() {
        let path = output_path(Path::new("output"), StrategyKind::Mil, &SourceId::Device(1), "mp4");
        assert_eq!(path, PathBuf::from("output/mil_webcam.mp4"));
    }

    #[test]
    fn test_output_path_is_deterministic_per_kind() {
        let source = SourceId::File(PathBuf::from("walk.mp4"));
        let a = output_path(Path::new("out"), StrategyKind::Boosting, &source, "mp4");
        let b = output_path(Path::new("out"), StrategyKind::Boosting, &source, "mp4");
        let c = output_path(Path::new("out"), StrategyKind::Csrt, &source, "mp4");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
