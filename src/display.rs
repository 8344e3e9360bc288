//! Quit signal and a windowless display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, trace};

use crate::frame::ToneMappedFrame;
use crate::traits::{CameraError, FrameDisplay, Result};

/// Operator stop request, shared between a signal handler and the loop.
#[derive(Debug, Clone, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    /// A lowered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal on Ctrl-C. Only one handler can be installed per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = Arc::clone(&self.0);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .map_err(|err| CameraError::Signal(err.to_string()))
    }

    /// Request a stop.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Display collaborator for headless capture: logs frame brightness instead
/// of rendering, and reports the [`QuitSignal`].
#[derive(Debug)]
pub struct HeadlessDisplay {
    quit: QuitSignal,
    shown: u64,
    report_every: u64,
}

impl HeadlessDisplay {
    /// Frames between progress lines by default (about one second at 60 Hz).
    pub const DEFAULT_REPORT_EVERY: u64 = 60;

    /// Display polling `quit`.
    #[must_use]
    pub const fn new(quit: QuitSignal) -> Self {
        Self {
            quit,
            shown: 0,
            report_every: Self::DEFAULT_REPORT_EVERY,
        }
    }

    /// Log a progress line every `frames` frames (minimum 1).
    #[must_use]
    pub fn with_report_every(mut self, frames: u64) -> Self {
        self.report_every = frames.max(1);
        self
    }

    /// Frames shown so far.
    #[must_use]
    pub const fn shown(&self) -> u64 {
        self.shown
    }
}

impl FrameDisplay for HeadlessDisplay {
    fn show(&mut self, frame: &ToneMappedFrame) -> Result<()> {
        self.shown += 1;
        let mean = frame.mean();
        if self.shown % self.report_every == 0 {
            info!(frames = self.shown, mean = format_args!("{mean:.1}"), "streaming");
        } else {
            trace!(frame = self.shown, mean, "frame shown");
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        if self.quit.is_raised() {
            info!("quit requested, stopping");
            return true;
        }
        false
    }
}
