//! Capture loop: acquire, tone-map, display, record, check stop conditions.
//!
//! Stop conditions are only checked once a frame has been fully handled. When
//! the loop ends for any reason, including a device error, the session is
//! torn down before [`CaptureLoop::run`] returns.

use std::fmt;

use tracing::{debug, error, info};

use crate::agc::{stretch_with, FrameStats};
use crate::session::DeviceSession;
use crate::traits::{CaptureDevice, FrameDisplay, FrameRecorder, Result};

/// Number of recorded frames after which the loop stops; 0 means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLimit(u64);

impl FrameLimit {
    /// No limit.
    pub const UNLIMITED: Self = Self(0);

    /// Stop after `frames` recorded frames (0 for no limit).
    #[must_use]
    pub const fn new(frames: u64) -> Self {
        Self(frames)
    }

    /// Configured count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether `recorded` frames satisfy the limit.
    #[must_use]
    pub const fn is_reached(self, recorded: u64) -> bool {
        self.0 > 0 && recorded >= self.0
    }
}

/// Why the loop ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The display collaborator reported a quit request.
    QuitRequested,
    /// The recorded-frame limit was reached.
    FrameLimitReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuitRequested => f.write_str("quit requested"),
            Self::FrameLimitReached => f.write_str("frame limit reached"),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Frames dequeued and tone-mapped.
    pub frames_captured: u64,
    /// Frames handed to the recorder; also the next frame index.
    pub frames_recorded: u64,
    /// Which condition ended the loop.
    pub stop_reason: StopReason,
}

/// Drives a streaming [`DeviceSession`] and its collaborators.
pub struct CaptureLoop<'a> {
    display: &'a mut dyn FrameDisplay,
    recorder: Option<&'a mut dyn FrameRecorder>,
    limit: FrameLimit,
    frames_captured: u64,
    frame_counter: u64,
}

impl<'a> CaptureLoop<'a> {
    /// A loop that displays every frame and records nothing.
    pub fn new(display: &'a mut dyn FrameDisplay) -> Self {
        Self {
            display,
            recorder: None,
            limit: FrameLimit::UNLIMITED,
            frames_captured: 0,
            frame_counter: 0,
        }
    }

    /// Record every frame through `recorder`.
    #[must_use]
    pub fn with_recorder(mut self, recorder: &'a mut dyn FrameRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Stop once `limit` frames have been recorded.
    #[must_use]
    pub fn with_limit(mut self, limit: FrameLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Frames recorded so far.
    #[must_use]
    pub const fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Frames captured so far, recorded or not.
    #[must_use]
    pub const fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    /// Run until a stop condition or a fatal error, then close the session.
    ///
    /// A loop error takes precedence over a teardown error; the teardown error
    /// is logged either way.
    pub fn run<D: CaptureDevice>(
        &mut self,
        mut session: DeviceSession<D>,
    ) -> Result<CaptureSummary> {
        let outcome = self.drive(&mut session);
        if let Err(err) = &outcome {
            error!(%err, frames = self.frames_captured, "capture aborted, tearing down");
        }

        let teardown = session.close();
        let summary = outcome?;
        teardown?;

        info!(
            captured = summary.frames_captured,
            recorded = summary.frames_recorded,
            reason = %summary.stop_reason,
            "capture finished"
        );
        Ok(summary)
    }

    fn drive<D: CaptureDevice>(
        &mut self,
        session: &mut DeviceSession<D>,
    ) -> Result<CaptureSummary> {
        loop {
            let raw = session.acquire()?;
            let stats = FrameStats::scan(&raw);
            if stats.is_flat() {
                debug!(value = stats.min, "flat frame, tone-mapped to black");
            }
            let agc = stretch_with(&raw, stats);
            self.frames_captured += 1;

            self.display.show(&agc)?;

            if let Some(recorder) = self.recorder.as_deref_mut() {
                recorder.record(&raw, &agc, self.frame_counter)?;
                self.frame_counter += 1;
            }

            debug!(
                frame = self.frames_captured,
                recorded = self.frame_counter,
                min = stats.min,
                max = stats.max,
                "frame handled"
            );

            if let Some(stop_reason) = self.stop_reason() {
                info!(reason = %stop_reason, "stopping capture");
                return Ok(CaptureSummary {
                    frames_captured: self.frames_captured,
                    frames_recorded: self.frame_counter,
                    stop_reason,
                });
            }
        }
    }

    fn stop_reason(&mut self) -> Option<StopReason> {
        if self.display.quit_requested() {
            Some(StopReason::QuitRequested)
        } else if self.limit.is_reached(self.frame_counter) {
            Some(StopReason::FrameLimitReached)
        } else {
            None
        }
    }
}
