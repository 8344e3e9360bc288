//! Mock device implementation for testing without hardware.
//!
//! Behaves like a single-planar V4L2 driver: buffers must be requested and
//! mapped before streaming, a buffer can be queued once, and dequeue needs a
//! queued buffer while streaming. Every call is appended to a shared
//! [`CallLog`] (including the implicit close on drop) and any operation can be
//! scripted to fail on its n-th call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::buffer::BufferInfo;
use crate::traits::{CameraError, CaptureDevice, DeviceCapabilities, Format, FourCC, Result};

/// One call made on the mock, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    /// `set_format`.
    SetFormat,
    /// `request_buffers(count)`.
    RequestBuffers(u32),
    /// `map_buffer(index)`.
    MapBuffer(u32),
    /// `stream_on`.
    StreamOn,
    /// `enqueue(index)`.
    Enqueue(u32),
    /// `dequeue` of buffer `index`.
    Dequeue(u32),
    /// `stream_off`.
    StreamOff,
    /// `release_buffers`.
    ReleaseBuffers,
    /// Device dropped.
    Close,
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `set_format`.
    SetFormat,
    /// `request_buffers`.
    RequestBuffers,
    /// `map_buffer`.
    MapBuffer,
    /// `stream_on`.
    StreamOn,
    /// `enqueue`.
    Enqueue,
    /// `dequeue`.
    Dequeue,
    /// `stream_off`.
    StreamOff,
}

/// Shared, cloneable record of calls; survives the device being dropped.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DeviceCall>>>);

impl CallLog {
    fn push(&self, call: DeviceCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    /// Copy of the calls so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

/// Test pattern types for mock frame generation.
#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    /// Horizontal ramp from 0 at the left edge to `u16::MAX` at the right.
    Ramp,
    /// Every sample has the same value.
    Flat(u16),
    /// Scene drifting by `step` counts per frame on a warm background.
    Drift {
        /// Added to every sample per captured frame.
        step: u16,
    },
}

/// Zero-initialised stand-in for the driver's mapping, of an exact length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRegion {
    bytes: Vec<u8>,
}

impl MappedRegion {
    /// Allocate `length` zeroed bytes.
    #[must_use]
    pub fn zeroed(length: usize) -> Self {
        Self {
            bytes: vec![0; length],
        }
    }

    /// Region length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read access.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Write access.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Mock device for testing without hardware.
#[derive(Debug)]
pub struct MockDevice {
    capabilities: DeviceCapabilities,
    format: Format,
    applied_override: Option<Format>,
    buffer_length: Option<usize>,
    pattern: TestPattern,
    region: Option<MappedRegion>,
    requested: bool,
    streaming: bool,
    queued: Option<u32>,
    frame_count: u32,
    log: CallLog,
    failures: Vec<(MockOp, u64)>,
    counts: HashMap<MockOp, u64>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Create a new mock device with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: DeviceCapabilities {
                driver: "mock".to_owned(),
                card: "Mock Boson".to_owned(),
                bus_info: "mock:0".to_owned(),
                can_capture: true,
                can_stream: true,
            },
            format: Format::BOSON_640,
            applied_override: None,
            buffer_length: None,
            pattern: TestPattern::Ramp,
            region: None,
            requested: false,
            streaming: false,
            queued: None,
            frame_count: 0,
            log: CallLog::default(),
            failures: Vec::new(),
            counts: HashMap::new(),
        }
    }

    /// Set the format for this mock device.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Make `set_format` apply `format` whatever was requested.
    #[must_use]
    pub fn with_applied_format(mut self, format: Format) -> Self {
        self.applied_override = Some(format);
        self
    }

    /// Set the capabilities for this mock device.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Report and map a buffer of `length` bytes instead of the frame size.
    #[must_use]
    pub fn with_buffer_length(mut self, length: usize) -> Self {
        self.buffer_length = Some(length);
        self
    }

    /// Set the test pattern for frame generation.
    #[must_use]
    pub fn with_pattern(mut self, pattern: TestPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Fail the `nth` (0-based) call of `op`.
    #[must_use]
    pub fn fail_at(mut self, op: MockOp, nth: u64) -> Self {
        self.failures.push((op, nth));
        self
    }

    /// Handle on the call log.
    #[must_use]
    pub fn call_log(&self) -> CallLog {
        CallLog(Arc::clone(&self.log.0))
    }

    fn should_fail(&mut self, op: MockOp) -> bool {
        let count = self.counts.entry(op).or_insert(0);
        let nth = *count;
        *count += 1;
        self.failures.contains(&(op, nth))
    }
}

impl CaptureDevice for MockDevice {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        self.log.push(DeviceCall::SetFormat);
        if self.should_fail(MockOp::SetFormat) {
            return Err(CameraError::FormatRejected {
                requested: *format,
                reason: "injected failure".to_owned(),
            });
        }
        self.format = self.applied_override.unwrap_or(*format);
        Ok(self.format)
    }

    fn request_buffers(&mut self, count: u32) -> Result<u32> {
        self.log.push(DeviceCall::RequestBuffers(count));
        if self.should_fail(MockOp::RequestBuffers) {
            return Err(CameraError::BufferRequestFailed("injected failure".to_owned()));
        }
        self.requested = true;
        Ok(count)
    }

    fn map_buffer(&mut self, index: u32) -> Result<BufferInfo> {
        self.log.push(DeviceCall::MapBuffer(index));
        if self.should_fail(MockOp::MapBuffer) || !self.requested {
            return Err(CameraError::MappingFailed("injected failure".to_owned()));
        }
        let length = self.buffer_length.unwrap_or(self.format.size as usize);
        self.region = Some(MappedRegion::zeroed(length));
        Ok(BufferInfo { index, length })
    }

    fn stream_on(&mut self) -> Result<()> {
        self.log.push(DeviceCall::StreamOn);
        if self.should_fail(MockOp::StreamOn) || self.region.is_none() {
            return Err(CameraError::StreamOnFailed("injected failure".to_owned()));
        }
        self.streaming = true;
        Ok(())
    }

    fn enqueue(&mut self, index: u32) -> Result<()> {
        self.log.push(DeviceCall::Enqueue(index));
        if self.should_fail(MockOp::Enqueue) {
            return Err(CameraError::EnqueueFailed("injected failure".to_owned()));
        }
        if self.region.is_none() || self.queued.is_some() {
            return Err(CameraError::EnqueueFailed("EINVAL".to_owned()));
        }
        self.queued = Some(index);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<(u32, &[u8])> {
        let index = self.queued.unwrap_or(0);
        self.log.push(DeviceCall::Dequeue(index));
        if self.should_fail(MockOp::Dequeue) {
            self.queued = None;
            return Err(CameraError::DequeueFailed("injected failure".to_owned()));
        }
        if !self.streaming || self.queued.is_none() {
            return Err(CameraError::DequeueFailed(
                "no buffer queued, would block forever".to_owned(),
            ));
        }
        self.queued = None;

        let format = self.format;
        let pattern = self.pattern;
        let frame = self.frame_count;
        self.frame_count += 1;

        let region = self
            .region
            .as_mut()
            .ok_or_else(|| CameraError::DequeueFailed("no buffer mapped".to_owned()))?;
        fill_frame(region.as_bytes_mut(), &format, pattern, frame);
        Ok((index, region.as_bytes()))
    }

    fn stream_off(&mut self) -> Result<()> {
        self.log.push(DeviceCall::StreamOff);
        self.streaming = false;
        self.queued = None;
        if self.should_fail(MockOp::StreamOff) {
            return Err(CameraError::StreamOffFailed("injected failure".to_owned()));
        }
        Ok(())
    }

    fn release_buffers(&mut self) {
        self.log.push(DeviceCall::ReleaseBuffers);
        self.region = None;
        self.requested = false;
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.log.push(DeviceCall::Close);
    }
}

/// Write one little-endian Y16 frame into the start of `data`.
fn fill_frame(data: &mut [u8], format: &Format, pattern: TestPattern, frame: u32) {
    let width = format.width.max(1);
    let samples = data.chunks_exact_mut(2).take(format.frame_bytes() / 2);

    for (i, pair) in samples.enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let col = (i as u32) % width;
        let value = match pattern {
            TestPattern::Ramp => ramp_value(col, width),
            TestPattern::Flat(v) => v,
            TestPattern::Drift { step } => {
                #[allow(clippy::cast_possible_truncation)]
                let offset = (frame as u16).wrapping_mul(step);
                ramp_value(col, width)
                    .saturating_div(4)
                    .wrapping_add(20_000)
                    .wrapping_add(offset)
            }
        };
        pair.copy_from_slice(&value.to_le_bytes());
    }
}

fn ramp_value(col: u32, width: u32) -> u16 {
    let span = width.saturating_sub(1).max(1);
    u16::try_from(u64::from(col) * u64::from(u16::MAX) / u64::from(span)).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_is_zeroed_with_exact_length() {
        let region = MappedRegion::zeroed(655_360);
        assert_eq!(region.len(), 655_360);
        assert!(!region.is_empty());
        assert!(region.as_bytes().iter().all(|&b| b == 0));
    }
    use crate::frame::RawFrameView;

    #[test]
    fn test_mock_device_creation() {
        let device = MockDevice::new();
        assert_eq!(device.capabilities().driver, "mock");
        assert!(device.capabilities().can_capture);
        assert!(device.capabilities().can_stream);
    }

    #[test]
    fn test_mock_device_format() {
        let mut device = MockDevice::new();
        let requested = Format::new(320, 256, FourCC::Y16);
        let actual = device.set_format(&requested).expect("set_format should succeed");
        assert_eq!(actual, requested);

        let mut coercing = MockDevice::new().with_applied_format(Format::BOSON_640);
        let actual = coercing.set_format(&requested).expect("set_format should succeed");
        assert_eq!(actual, Format::BOSON_640);
    }

    #[test]
    fn test_mapped_region_starts_zeroed() {
        let mut device = MockDevice::new().with_format(Format::new(4, 2, FourCC::Y16));
        device.request_buffers(1).expect("request");
        let info = device.map_buffer(0).expect("map");
        assert_eq!(info.length, 16);
        let region = device.region.as_ref().expect("mapped");
        assert!(region.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_dequeue_requires_enqueue() {
        let mut device = MockDevice::new().with_format(Format::new(4, 2, FourCC::Y16));
        device.request_buffers(1).expect("request");
        device.map_buffer(0).expect("map");
        device.stream_on().expect("stream on");

        assert!(device.dequeue().is_err());
        device.enqueue(0).expect("enqueue");
        assert!(device.enqueue(0).is_err());
        assert!(device.dequeue().is_ok());
    }

    #[test]
    fn test_ramp_pattern() {
        let format = Format::new(640, 4, FourCC::Y16);
        let mut data = vec![0u8; format.frame_bytes()];
        fill_frame(&mut data, &format, TestPattern::Ramp, 0);

        let view = RawFrameView::new(&data, 640, 4).expect("view");
        assert_eq!(view.sample(2, 0), Some(0));
        assert_eq!(view.sample(2, 639), Some(u16::MAX));
        assert!(view.sample(0, 100) < view.sample(0, 200));
    }

    #[test]
    fn test_flat_pattern() {
        let format = Format::new(8, 8, FourCC::Y16);
        let mut data = vec![0u8; format.frame_bytes()];
        fill_frame(&mut data, &format, TestPattern::Flat(0x1234), 0);
        assert!(data.chunks_exact(2).all(|p| p == [0x34, 0x12]));
    }

    #[test]
    fn test_drift_pattern_moves_between_frames() {
        let format = Format::new(8, 2, FourCC::Y16);
        let mut first = vec![0u8; format.frame_bytes()];
        let mut second = vec![0u8; format.frame_bytes()];
        fill_frame(&mut first, &format, TestPattern::Drift { step: 10 }, 0);
        fill_frame(&mut second, &format, TestPattern::Drift { step: 10 }, 1);

        let a = RawFrameView::new(&first, 8, 2).expect("view");
        let b = RawFrameView::new(&second, 8, 2).expect("view");
        assert_eq!(b.sample(0, 3).map(|v| v - 10), a.sample(0, 3));
    }

    #[test]
    fn test_log_survives_drop() {
        let device = MockDevice::new();
        let log = device.call_log();
        drop(device);
        assert_eq!(log.snapshot(), vec![DeviceCall::Close]);
    }
}
