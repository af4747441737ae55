use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use roitrack::{
    presenter::{CancelFlag, FixedRoi, HeadlessPresenter, Presenter, RoiSelector, WindowPresenter},
    sink::{self, VideoSink},
    source::{FrameSource, VideoSource},
    BoundingBox, Config, SessionOptions, SessionReport, TrackerStrategy, TrackingSession,
};

#[derive(Parser)]
#[command(
    name = "roitrack",
    about = "Object tracking on a video file or camera using OpenCV",
    version
)]
struct Args {
    /// Video source (file path or webcam index)
    #[arg(long)]
    source: String,

    /// Tracking algorithm: BOOSTING, CSRT or MIL
    #[arg(long)]
    tracker: String,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial target region, skips interactive selection
    #[arg(long, value_name = "X,Y,W,H")]
    roi: Option<BoundingBox>,

    /// Run without any window (requires --roi)
    #[arg(long)]
    headless: bool,

    /// Directory for the recorded video (overrides the config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write the per-frame tracking record to this JSON file
    #[arg(long)]
    log_json: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let report = run(args)?;
    println!("Average FPS: {:.2}", report.average_fps);
    Ok(())
}

fn run(args: Args) -> anyhow::Result<SessionReport> {
    // 1. Config and options; nothing is opened until these are valid
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.headless {
        config.show_window = false;
    }
    let opts = SessionOptions::new(&args.source, &args.tracker, config)?;
    if !opts.config.show_window && args.roi.is_none() {
        bail!("running without a window requires --roi");
    }
    let tracker = TrackerStrategy::create(opts.kind)?;
    info!("Using {} tracker", opts.kind);

    // 2. Source and its properties
    let source = VideoSource::open(&opts.source, opts.config.read_retries)?;
    let meta = source.metadata();
    let fps = meta.effective_fps(opts.config.fallback_fps);
    if fps != meta.fps {
        warn!("source reports {} fps, recording at {:.2}", meta.fps, fps);
    }

    // 3. Recorder
    fs::create_dir_all(&opts.config.output_dir)?;
    let out_path = sink::output_path(&opts.config.output_dir, opts.kind, &opts.source, &opts.config.container);
    let video_sink = VideoSink::open(&out_path, meta.width, meta.height, fps, opts.config.fourcc_chars())?;

    // 4. Cancellation: quit key in the window, Ctrl-C everywhere
    let cancel = CancelFlag::new();
    cancel.install_ctrlc().context("error setting Ctrl-C handler")?;

    let keep_history = args.log_json.is_some();
    let report = match args.roi {
        Some(roi) if opts.config.show_window => track(
            tracker,
            source,
            video_sink,
            WindowPresenter::new(&opts.config, cancel),
            FixedRoi(roi),
            &opts.config,
            keep_history,
        )?,
        Some(roi) => track(
            tracker,
            source,
            video_sink,
            HeadlessPresenter::new(cancel),
            FixedRoi(roi),
            &opts.config,
            keep_history,
        )?,
        None => track(
            tracker,
            source,
            video_sink,
            WindowPresenter::new(&opts.config, cancel.clone()),
            WindowPresenter::new(&opts.config, cancel),
            &opts.config,
            keep_history,
        )?,
    };

    // 5. Tracking log
    if let Some(path) = &args.log_json {
        let json = serde_json::to_string_pretty(&report.history)?;
        let mut file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        file.write_all(json.as_bytes())?;
        info!("Tracking details saved to {:?}", path);
    }

    Ok(report)
}

fn track<P: Presenter, R: RoiSelector>(
    tracker: TrackerStrategy,
    source: VideoSource,
    video_sink: VideoSink,
    presenter: P,
    mut selector: R,
    config: &Config,
    keep_history: bool,
) -> anyhow::Result<SessionReport> {
    let mut session = TrackingSession::new(tracker, source, video_sink, presenter, config);
    if keep_history {
        session = session.with_history();
    }
    session.initialize(&mut selector)?;
    let report = session.run()?;
    info!(
        "Processed {} frames into {:?}",
        report.frames,
        session.sink().path()
    );
    Ok(report)
}
