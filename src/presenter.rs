use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;
use opencv::{core::Mat, highgui};

use crate::config::Config;
use crate::error::Result;
use crate::track::BoundingBox;

/// Shared stop request, set from a signal handler and read by the loop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Route Ctrl-C to this flag.
    pub fn install_ctrlc(&self) -> std::result::Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.cancel())
    }
}

/// Shows processed frames and doubles as the cancellation poll.
pub trait Presenter {
    fn present(&mut self, frame: &Mat) -> Result<()>;

    /// Bounded, non-blocking check; `true` once the operator asked to stop.
    fn poll_cancel(&mut self) -> Result<bool>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Produces the initial target region from the first frame.
pub trait RoiSelector {
    fn select_roi(&mut self, frame: &Mat) -> Result<BoundingBox>;
}

/// Region given up front, e.g. with `--roi`.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoi(pub BoundingBox);

impl RoiSelector for FixedRoi {
    fn select_roi(&mut self, _frame: &Mat) -> Result<BoundingBox> {
        Ok(self.0)
    }
}

/// highgui windows: live display, quit key, interactive selection.
pub struct WindowPresenter {
    window_title: String,
    roi_window_title: String,
    wait_ms: i32,
    quit_key: i32,
    cancel: CancelFlag,
}

impl WindowPresenter {
    pub fn new(config: &Config, cancel: CancelFlag) -> Self {
        Self {
            window_title: config.window_title.clone(),
            roi_window_title: config.roi_window_title.clone(),
            wait_ms: config.poll_wait_ms,
            quit_key: config.quit_key as i32,
            cancel,
        }
    }
}

impl Presenter for WindowPresenter {
    fn present(&mut self, frame: &Mat) -> Result<()> {
        highgui::imshow(&self.window_title, frame)?;
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool> {
        let key = highgui::wait_key(self.wait_ms)?;
        if key >= 0 && (key & 0xFF) == self.quit_key {
            info!("Tracking interrupted by user.");
            self.cancel.cancel();
        }
        Ok(self.cancel.is_cancelled())
    }

    fn close(&mut self) -> Result<()> {
        highgui::destroy_all_windows()?;
        Ok(())
    }
}

impl RoiSelector for WindowPresenter {
    fn select_roi(&mut self, frame: &Mat) -> Result<BoundingBox> {
        let rect = highgui::select_roi(&self.roi_window_title, frame, false, false, true)?;
        highgui::destroy_window(&self.roi_window_title)?;
        Ok(BoundingBox::from(rect))
    }
}

/// No display at all; only Ctrl-C can stop the run early.
pub struct HeadlessPresenter {
    cancel: CancelFlag,
}

impl HeadlessPresenter {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl Presenter for HeadlessPresenter {
    fn present(&mut self, _frame: &Mat) -> Result<()> {
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool> {
        Ok(self.cancel.is_cancelled())
    }
}
