//! Core traits and types for the RAW16 capture pipeline.

use std::fmt;
use std::path::PathBuf;

use crate::buffer::BufferInfo;
use crate::config::ConfigError;
use crate::frame::{RawFrameView, ToneMappedFrame};
use crate::session::SessionState;

/// Bytes per sample of the 16-bit capture encoding.
pub const BYTES_PER_SAMPLE: u32 = 2;

/// Pixel format representation (e.g., Y16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// 16-bit little-endian greyscale (`V4L2_PIX_FMT_Y16`).
    pub const Y16: Self = Self::new(b"Y16 ");
    /// YUYV pixel format, reported by sensors left in their 8-bit video mode.
    pub const YUYV: Self = Self::new(b"YUYV");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = String::from_utf8_lossy(&self.0);
        f.write_str(text.trim_end())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// The RAW16 format of a Boson 640 core.
    pub const BOSON_640: Self = Self::new(640, 512, FourCC::Y16);

    /// Create a new single-channel 16-bit format specification.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = width * BYTES_PER_SAMPLE;
        let size = stride * height;
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }

    /// Number of bytes one frame occupies in the mapped buffer.
    #[must_use]
    pub const fn frame_bytes(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (BYTES_PER_SAMPLE as usize)
    }

    /// Whether the driver applied the same encoding and resolution with
    /// packed rows.
    ///
    /// Frames are read as `width * height` contiguous samples, so a stride
    /// carrying row padding does not match.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.fourcc == other.fourcc
            && other.stride == other.width * BYTES_PER_SAMPLE
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.fourcc)
    }
}

/// Device capability flags.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card/device name.
    pub card: String,
    /// Bus information.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming.
    pub can_stream: bool,
}

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// The device node could not be opened.
    #[error("failed to open {path}: {reason}")]
    DeviceOpenFailed {
        /// Device node path.
        path: String,
        /// Driver or OS message.
        reason: String,
    },
    /// The device lacks a capability the session needs.
    #[error("video capture is not available: {0}")]
    CapabilityMissing(String),
    /// The driver refused or altered the requested format.
    #[error("format {requested} rejected: {reason}")]
    FormatRejected {
        /// Format the session asked for.
        requested: Format,
        /// Why it was rejected.
        reason: String,
    },
    /// `VIDIOC_REQBUFS` failed or granted no buffers.
    #[error("buffer request failed: {0}")]
    BufferRequestFailed(String),
    /// `VIDIOC_QUERYBUF` or `mmap` failed.
    #[error("buffer mapping failed: {0}")]
    MappingFailed(String),
    /// The mapped region cannot hold one frame.
    #[error("mapped buffer holds {length} bytes, frame needs {required}")]
    BufferTooSmall {
        /// Bytes available.
        length: usize,
        /// Bytes one frame needs.
        required: usize,
    },
    /// `VIDIOC_STREAMON` failed.
    #[error("VIDIOC_STREAMON failed: {0}")]
    StreamOnFailed(String),
    /// `VIDIOC_QBUF` failed.
    #[error("VIDIOC_QBUF failed: {0}")]
    EnqueueFailed(String),
    /// `VIDIOC_DQBUF` failed.
    #[error("VIDIOC_DQBUF failed: {0}")]
    DequeueFailed(String),
    /// `VIDIOC_STREAMOFF` failed.
    #[error("VIDIOC_STREAMOFF failed: {0}")]
    StreamOffFailed(String),
    /// A session operation was called out of order.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },
    /// The enqueue/dequeue handoff was broken.
    #[error("buffer ownership violation: {0}")]
    OwnershipViolation(String),
    /// A captured or tone-mapped frame failed validation.
    #[error("frame validation failed: {0}")]
    Validation(String),
    /// A frame could not be persisted.
    #[error("failed to record {}: {reason}", path.display())]
    Record {
        /// Artifact path.
        path: PathBuf,
        /// Encoder or filesystem message.
        reason: String,
    },
    /// The quit signal handler could not be installed.
    #[error("failed to install quit signal handler: {0}")]
    Signal(String),
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// The device I/O boundary: one method per V4L2 primitive the session drives.
///
/// Implementations only translate calls; ordering and ownership rules are
/// enforced by [`DeviceSession`](crate::session::DeviceSession). Closing the
/// handle is dropping the value.
pub trait CaptureDevice {
    /// Get device capabilities, queried when the device was opened.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Set capture format. Returns the actual format set by the driver.
    fn set_format(&mut self, format: &Format) -> Result<Format>;

    /// Request `count` mmap buffers. Returns the number the driver granted.
    fn request_buffers(&mut self, count: u32) -> Result<u32>;

    /// Query buffer `index` and map it into user space.
    fn map_buffer(&mut self, index: u32) -> Result<BufferInfo>;

    /// Enable streaming.
    fn stream_on(&mut self) -> Result<()>;

    /// Hand buffer `index` to the driver.
    fn enqueue(&mut self, index: u32) -> Result<()>;

    /// Block until the driver returns a filled buffer; yields its index and bytes.
    fn dequeue(&mut self) -> Result<(u32, &[u8])>;

    /// Disable streaming. All buffers return to user space.
    fn stream_off(&mut self) -> Result<()>;

    /// Unmap and free the requested buffers.
    fn release_buffers(&mut self);
}

/// Receives each tone-mapped frame and reports whether the operator asked to quit.
pub trait FrameDisplay {
    /// Present one frame.
    fn show(&mut self, frame: &ToneMappedFrame) -> Result<()>;

    /// Polled once per iteration, after the frame is fully handled.
    fn quit_requested(&mut self) -> bool;
}

/// Persists the raw and tone-mapped matrices of one frame.
pub trait FrameRecorder {
    /// Store frame `index`. The raw view is only valid for this call.
    fn record(&mut self, raw: &RawFrameView<'_>, agc: &ToneMappedFrame, index: u64) -> Result<()>;
}
