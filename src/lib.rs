//! Boson-Capture: RAW16 thermal capture over V4L2
//!
//! This library drives a single mmap buffer through the V4L2 streaming state
//! machine, stretches each 16-bit frame to 8 bits with a linear min-max AGC,
//! and optionally records both matrices as TIFF. The device sits behind the
//! [`CaptureDevice`] trait, so the whole pipeline runs against real hardware
//! or a mock device in tests.

pub mod agc;
pub mod buffer;
pub mod capture;
pub mod config;
pub mod device;
pub mod display;
pub mod frame;
pub mod record;
pub mod session;
pub mod traits;
pub mod validation;

#[cfg(test)]
pub mod mock;

pub use agc::{linear_stretch, FrameStats};
pub use capture::{CaptureLoop, CaptureSummary, FrameLimit, StopReason};
pub use config::{CaptureConfig, ConfigError, FileConfig};
pub use device::V4L2Device;
pub use display::{HeadlessDisplay, QuitSignal};
pub use frame::{RawFrameView, ToneMappedFrame};
pub use record::TiffRecorder;
pub use session::{DeviceSession, SessionState};
pub use traits::{
    CameraError, CaptureDevice, DeviceCapabilities, Format, FourCC, FrameDisplay, FrameRecorder,
};
