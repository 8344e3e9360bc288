//! V4L2 device implementation using the v4l crate.

use tracing::{debug, error, trace};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::{CaptureStream as _, Stream as _};
use v4l::video::Capture;
use v4l::Device;

use crate::buffer::BufferInfo;
use crate::traits::{CameraError, CaptureDevice, DeviceCapabilities, Format, FourCC, Result};

/// V4L2 device implementation wrapping the v4l crate.
///
/// The v4l mmap stream couples QBUF with the following DQBUF, so
/// [`enqueue`](CaptureDevice::enqueue) only records which buffer was handed
/// over and [`dequeue`](CaptureDevice::dequeue) issues both ioctls.
///
/// The stream also issues STREAMOFF when dropped and panics if that fails.
/// After a failed [`stream_off`](CaptureDevice::stream_off) the stream is
/// therefore leaked instead of dropped.
pub struct V4L2Device {
    // Dropped before `device`: unmaps and frees the buffers on the open handle.
    stream: Option<MmapStream<'static>>,
    device: Device,
    path: String,
    capabilities: DeviceCapabilities,
    format: Option<Format>,
    queued: Option<u32>,
    stop_failed: bool,
}

impl V4L2Device {
    /// Open a V4L2 device by index (e.g., 0 for /dev/video0).
    pub fn open(index: u32) -> Result<Self> {
        let path = format!("/dev/video{index}");
        let open_failed = |reason: String| CameraError::DeviceOpenFailed {
            path: path.clone(),
            reason,
        };

        let device = Device::new(index as usize).map_err(|err| open_failed(err.to_string()))?;
        let caps = device
            .query_caps()
            .map_err(|err| open_failed(err.to_string()))?;

        let capabilities = DeviceCapabilities {
            driver: caps.driver,
            card: caps.card,
            bus_info: caps.bus,
            can_capture: caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE),
            can_stream: caps.capabilities.contains(v4l::capability::Flags::STREAMING),
        };
        debug!(%path, card = %capabilities.card, "device node opened");

        Ok(Self {
            stream: None,
            device,
            path,
            capabilities,
            format: None,
            queued: None,
            stop_failed: false,
        })
    }

    /// Device node path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Format currently programmed on the driver.
    pub fn current_format(&self) -> Result<Format> {
        Ok(from_v4l(&self.device.format()?))
    }

    fn stream_mut(&mut self, operation: &str) -> Result<&mut MmapStream<'static>> {
        self.stream.as_mut().ok_or_else(|| {
            CameraError::OwnershipViolation(format!("{operation} before buffers were requested"))
        })
    }
}

/// Drop `stream`, or leak it when its own STREAMOFF on drop is known to fail.
fn retire<S>(stream: S, stop_failed: bool) -> bool {
    if stop_failed {
        std::mem::forget(stream);
        false
    } else {
        drop(stream);
        true
    }
}

fn from_v4l(fmt: &v4l::Format) -> Format {
    Format {
        width: fmt.width,
        height: fmt.height,
        fourcc: FourCC::from(fmt.fourcc),
        stride: fmt.stride,
        size: fmt.size,
    }
}

impl CaptureDevice for V4L2Device {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn set_format(&mut self, format: &Format) -> Result<Format> {
        let rejected = |reason: String| CameraError::FormatRejected {
            requested: *format,
            reason,
        };

        let mut fmt = self.device.format().map_err(|err| rejected(err.to_string()))?;
        fmt.width = format.width;
        fmt.height = format.height;
        fmt.fourcc = format.fourcc.into();

        let fmt = self
            .device
            .set_format(&fmt)
            .map_err(|err| rejected(err.to_string()))?;

        let applied = from_v4l(&fmt);
        self.format = Some(applied);
        Ok(applied)
    }

    /// REQBUFS, QUERYBUF and mmap in one step.
    ///
    /// The v4l stream does not expose the count the driver granted, so the
    /// requested count is reported.
    fn request_buffers(&mut self, count: u32) -> Result<u32> {
        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, count)
            .map_err(|err| CameraError::BufferRequestFailed(err.to_string()))?;
        self.stream = Some(stream);
        self.stop_failed = false;
        Ok(count)
    }

    /// The mapping already happened in [`request_buffers`](Self::request_buffers).
    ///
    /// v4l does not expose the queried buffer length either, so the negotiated
    /// `sizeimage` is reported. The bytes actually dequeued are length-checked
    /// again by [`RawFrameView::new`](crate::frame::RawFrameView::new) on every
    /// acquire.
    fn map_buffer(&mut self, index: u32) -> Result<BufferInfo> {
        if self.stream.is_none() {
            return Err(CameraError::MappingFailed(format!(
                "buffer {index} queried before buffers were requested"
            )));
        }
        let length = self
            .format
            .map(|format| format.size as usize)
            .ok_or_else(|| CameraError::MappingFailed("no format negotiated".to_owned()))?;
        Ok(BufferInfo { index, length })
    }

    fn stream_on(&mut self) -> Result<()> {
        self.stream_mut("stream on")?
            .start()
            .map_err(|err| CameraError::StreamOnFailed(err.to_string()))
    }

    fn enqueue(&mut self, index: u32) -> Result<()> {
        if self.stream.is_none() {
            return Err(CameraError::EnqueueFailed(
                "no buffers have been requested".to_owned(),
            ));
        }
        if let Some(pending) = self.queued {
            return Err(CameraError::EnqueueFailed(format!(
                "buffer {pending} is already queued"
            )));
        }
        self.queued = Some(index);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<(u32, &[u8])> {
        let index = self
            .queued
            .take()
            .ok_or_else(|| CameraError::DequeueFailed("no buffer is queued".to_owned()))?;
        let stream = self.stream.as_mut().ok_or_else(|| {
            CameraError::DequeueFailed("no buffers have been requested".to_owned())
        })?;

        let (bytes, meta) = stream
            .next()
            .map_err(|err| CameraError::DequeueFailed(err.to_string()))?;
        trace!(
            index,
            sequence = meta.sequence,
            bytes_used = meta.bytesused,
            "buffer dequeued"
        );
        Ok((index, bytes))
    }

    fn stream_off(&mut self) -> Result<()> {
        self.queued = None;
        let stopped = self.stream_mut("stream off")?.stop();
        stopped.map_err(|err| {
            self.stop_failed = true;
            CameraError::StreamOffFailed(err.to_string())
        })
    }

    fn release_buffers(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if retire(stream, self.stop_failed) {
            debug!(path = %self.path, "buffers released");
        } else {
            error!(path = %self.path, "streaming never stopped, leaking the buffer mapping");
        }
    }
}

impl Drop for V4L2Device {
    fn drop(&mut self) {
        self.release_buffers();
    }
}
