use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackError};
use crate::source::SourceId;
use crate::tracker::StrategyKind;

/// Tunables for a tracking run. Every field has a default, so `{}` is a
/// valid config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub fourcc: String,
    pub container: String,
    pub show_window: bool,
    pub show_fps: bool,
    pub window_title: String,
    pub roi_window_title: String,
    pub quit_key: char,
    /// Bounded wait of the per-frame cancellation poll, in milliseconds.
    pub poll_wait_ms: i32,
    /// Used when the source reports no usable frame rate.
    pub fallback_fps: f64,
    /// Extra attempts after a failed frame read before giving up on the stream.
    pub read_retries: u32,
    /// BGR
    pub target_color: [u8; 3],
    /// BGR
    pub failure_color: [u8; 3],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            fourcc: "mp4v".to_string(),
            container: "mp4".to_string(),
            show_window: true,
            show_fps: true,
            window_title: "Object Tracking".to_string(),
            roi_window_title: "Select target to track".to_string(),
            quit_key: 'q',
            poll_wait_ms: 1,
            fallback_fps: 30.0,
            read_retries: 0,
            target_color: [255, 0, 0],
            failure_color: [0, 0, 255],
        }
    }
}

impl Config {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fourcc.len() != 4 || !self.fourcc.is_ascii() {
            return Err(TrackError::InvalidConfig(format!(
                "fourcc must be exactly 4 ASCII characters, got '{}'",
                self.fourcc
            )));
        }
        if self.container.is_empty() {
            return Err(TrackError::InvalidConfig("container extension is empty".into()));
        }
        if !self.quit_key.is_ascii() {
            return Err(TrackError::InvalidConfig(format!(
                "quit key must be ASCII, got '{}'",
                self.quit_key
            )));
        }
        if self.poll_wait_ms < 1 {
            // wait_key(0) would block until a key press.
            return Err(TrackError::InvalidConfig(format!(
                "poll_wait_ms must be at least 1, got {}",
                self.poll_wait_ms
            )));
        }
        if !(self.fallback_fps.is_finite() && self.fallback_fps > 0.0) {
            return Err(TrackError::InvalidConfig(format!(
                "fallback_fps must be positive, got {}",
                self.fallback_fps
            )));
        }
        Ok(())
    }

    pub fn fourcc_chars(&self) -> [char; 4] {
        let mut chars = ['\0'; 4];
        for (slot, c) in chars.iter_mut().zip(self.fourcc.chars()) {
            *slot = c;
        }
        chars
    }
}

/// Validated run options: everything the binary needs before it opens
/// any device or file.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub source: SourceId,
    pub kind: StrategyKind,
    pub config: Config,
}

impl SessionOptions {
    /// Fails on an unknown tracker name or a bad config. Nothing is
    /// opened or created here.
    pub fn new(source: &str, tracker: &str, config: Config) -> Result<Self> {
        let kind: StrategyKind = tracker.parse()?;
        config.validate()?;
        let source = source.parse::<SourceId>()?;
        Ok(Self { source, kind, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"output_dir": "runs", "read_retries": 3, "show_window": false}}"#).unwrap();

        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("runs"));
        assert_eq!(cfg.read_retries, 3);
        assert!(!cfg.show_window);
        assert_eq!(cfg.fourcc, "mp4v");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_fourcc = Config { fourcc: "h264x".into(), ..Config::default() };
        assert!(matches!(bad_fourcc.validate(), Err(TrackError::InvalidConfig(_))));

        let blocking_poll = Config { poll_wait_ms: 0, ..Config::default() };
        assert!(blocking_poll.validate().is_err());

        let zero_fps = Config { fallback_fps: 0.0, ..Config::default() };
        assert!(zero_fps.validate().is_err());
    }

    #[test]
    fn test_fourcc_chars() {
        assert_eq!(Config::default().fourcc_chars(), ['m', 'p', '4', 'v']);
    }

    #[test]
    fn test_session_options_parse() {
        let opts = SessionOptions::new("0", "csrt", Config::default()).unwrap();
        assert_eq!(opts.source, SourceId::Device(0));
        assert_eq!(opts.kind, StrategyKind::Csrt);

        let opts = SessionOptions::new("clips/walk.mp4", "MIL", Config::default()).unwrap();
        assert_eq!(opts.source, SourceId::File(PathBuf::from("clips/walk.mp4")));
    }

    #[test]
    fn test_unsupported_tracker_fails_before_anything_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let cfg = Config { output_dir: out.clone(), ..Config::default() };

        let err = SessionOptions::new("video.mp4", "UNKNOWN", cfg).unwrap_err();
        assert!(matches!(err, TrackError::UnsupportedStrategy(_)));
        assert!(!out.exists());
    }
}
