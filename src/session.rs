//! Device session: the V4L2 streaming state machine around one mmap buffer.
//!
//! ```text
//! Opened -> Configured -> BuffersRequested -> Mapped -> Streaming -> Stopped -> Closed
//! ```
//!
//! Each operation checks the current state before touching the device. While
//! streaming, [`DeviceSession::acquire`] performs the enqueue/dequeue pair and
//! hands out a [`RawFrameView`] that borrows the session, so the view is gone
//! before the buffer can be queued again.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::buffer::{BufferInfo, FrameBuffer, Owner};
use crate::frame::RawFrameView;
use crate::traits::{CameraError, CaptureDevice, Format, Result};

/// Lifecycle state of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handle open, capabilities verified.
    Opened,
    /// Capture format accepted by the driver.
    Configured,
    /// Driver granted the buffer.
    BuffersRequested,
    /// Buffer queried and mapped.
    Mapped,
    /// Streaming enabled.
    Streaming,
    /// Streaming disabled.
    Stopped,
    /// Buffers released; nothing more may happen.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opened => "opened",
            Self::Configured => "configured",
            Self::BuffersRequested => "buffers-requested",
            Self::Mapped => "mapped",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// An open capture device driven through the single-buffer streaming protocol.
#[derive(Debug)]
pub struct DeviceSession<D: CaptureDevice> {
    device: D,
    state: SessionState,
    format: Option<Format>,
    buffer: Option<FrameBuffer>,
}

impl<D: CaptureDevice> DeviceSession<D> {
    /// Buffers requested from the driver. Capture and processing are fully
    /// serialised on this one buffer.
    pub const BUFFER_COUNT: u32 = 1;

    /// Wrap an open device after checking it can stream video capture.
    pub fn open(device: D) -> Result<Self> {
        let caps = device.capabilities();
        if !caps.can_capture {
            return Err(CameraError::CapabilityMissing(format!(
                "{} does not handle single-planar video capture",
                caps.card
            )));
        }
        if !caps.can_stream {
            return Err(CameraError::CapabilityMissing(format!(
                "{} does not support streaming I/O",
                caps.card
            )));
        }
        info!(driver = %caps.driver, card = %caps.card, bus = %caps.bus_info, "device opened");

        Ok(Self {
            device,
            state: SessionState::Opened,
            format: None,
            buffer: None,
        })
    }

    /// Run the whole startup sequence: open, negotiate, request and map, stream on.
    ///
    /// Any failure is fatal; whatever was acquired is released on the way out.
    pub fn start(device: D, format: &Format) -> Result<Self> {
        let mut session = Self::open(device)?;
        session.negotiate_format(format)?;
        session.request_buffers()?;
        session.enable_streaming()?;
        Ok(session)
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated format, once configured.
    #[must_use]
    pub const fn format(&self) -> Option<&Format> {
        self.format.as_ref()
    }

    /// Owner of the streaming buffer, once mapped.
    #[must_use]
    pub fn buffer_owner(&self) -> Option<Owner> {
        self.buffer.as_ref().map(FrameBuffer::owner)
    }

    /// Completed enqueue/dequeue round trips.
    #[must_use]
    pub fn frames_acquired(&self) -> u64 {
        self.buffer.as_ref().map_or(0, FrameBuffer::handoffs)
    }

    /// The underlying device.
    #[must_use]
    pub const fn device(&self) -> &D {
        &self.device
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CameraError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Request `format` and require the driver to apply it unchanged.
    pub fn negotiate_format(&mut self, format: &Format) -> Result<Format> {
        self.require(SessionState::Opened, "negotiate the format")?;

        let applied = self.device.set_format(format)?;
        if !format.matches(&applied) {
            return Err(CameraError::FormatRejected {
                requested: *format,
                reason: format!("driver applied {applied} with stride {}", applied.stride),
            });
        }

        info!(
            width = applied.width,
            height = applied.height,
            fourcc = %applied.fourcc,
            "format negotiated"
        );
        self.format = Some(applied);
        self.state = SessionState::Configured;
        Ok(applied)
    }

    /// Request the single buffer, then query and map it.
    pub fn request_buffers(&mut self) -> Result<BufferInfo> {
        self.require(SessionState::Configured, "request buffers")?;

        let granted = self.device.request_buffers(Self::BUFFER_COUNT)?;
        if granted == 0 {
            return Err(CameraError::BufferRequestFailed(
                "driver granted no buffers".to_owned(),
            ));
        }
        if granted != Self::BUFFER_COUNT {
            warn!(granted, "driver adjusted the buffer count, streaming with buffer 0 only");
        }
        self.state = SessionState::BuffersRequested;

        let info = self.device.map_buffer(0)?;
        let required = self.format.map_or(0, |format| format.frame_bytes());
        if info.length < required {
            return Err(CameraError::BufferTooSmall {
                length: info.length,
                required,
            });
        }

        info!(index = info.index, length = info.length, "buffer mapped");
        self.buffer = Some(FrameBuffer::new(info));
        self.state = SessionState::Mapped;
        Ok(info)
    }

    /// Turn streaming on.
    pub fn enable_streaming(&mut self) -> Result<()> {
        self.require(SessionState::Mapped, "enable streaming")?;
        self.device.stream_on()?;
        self.state = SessionState::Streaming;
        info!("streaming enabled");
        Ok(())
    }

    /// Enqueue the buffer, block until the driver fills it, dequeue it.
    ///
    /// The returned view is valid until the next call on this session.
    pub fn acquire(&mut self) -> Result<RawFrameView<'_>> {
        self.require(SessionState::Streaming, "acquire a frame")?;
        let (Some(format), Some(buffer)) = (self.format, self.buffer.as_mut()) else {
            return Err(CameraError::InvalidState {
                operation: "acquire a frame",
                state: self.state,
            });
        };

        let index = buffer.info().index;
        buffer.check_enqueue()?;
        self.device.enqueue(index)?;
        buffer.hand_to_kernel()?;

        let (returned, bytes) = self.device.dequeue()?;
        buffer.reclaim(returned)?;
        debug!(index, handoff = buffer.handoffs(), "buffer dequeued");

        RawFrameView::new(bytes, format.width, format.height)
    }

    /// Turn streaming off. The session is `Stopped` even if the driver
    /// reports an error, so teardown can continue.
    pub fn disable_streaming(&mut self) -> Result<()> {
        self.require(SessionState::Streaming, "disable streaming")?;
        self.state = SessionState::Stopped;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.reset();
        }
        self.device.stream_off()?;
        info!("streaming disabled");
        Ok(())
    }

    /// Tear the session down from whatever state it is in and close the handle.
    ///
    /// A streaming-disable failure is logged and returned, but buffers are
    /// still released and the handle still closed.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let mut outcome = Ok(());
        if self.state == SessionState::Streaming {
            if let Err(err) = self.disable_streaming() {
                error!(%err, "failed to disable streaming, closing anyway");
                outcome = Err(err);
            }
        }

        if matches!(
            self.state,
            SessionState::BuffersRequested | SessionState::Mapped | SessionState::Stopped
        ) {
            self.device.release_buffers();
            self.buffer = None;
        }

        self.state = SessionState::Closed;
        info!("session closed");
        outcome
    }
}

impl<D: CaptureDevice> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        // Errors are logged inside teardown.
        let _ = self.teardown();
    }
}
