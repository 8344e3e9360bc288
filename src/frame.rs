//! Frame matrices: the raw 16-bit view over the mapped buffer and the owned
//! 8-bit tone-mapped result.

use crate::traits::{CameraError, Result, BYTES_PER_SAMPLE};

/// Non-owning height x width view of little-endian 16-bit samples.
///
/// Borrowed from the device session for one ownership window; it cannot
/// outlive the dequeue that produced it.
#[derive(Debug, Clone, Copy)]
pub struct RawFrameView<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> RawFrameView<'a> {
    /// Interpret the first `width * height * 2` bytes of `bytes` as a frame.
    pub fn new(bytes: &'a [u8], width: u32, height: u32) -> Result<Self> {
        let required = (width as usize) * (height as usize) * (BYTES_PER_SAMPLE as usize);
        let bytes = bytes.get(..required).ok_or(CameraError::BufferTooSmall {
            length: bytes.len(),
            required,
        })?;
        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    /// Frame width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Number of samples.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Whether the frame has no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at (`row`, `col`), or `None` outside the frame.
    #[must_use]
    pub fn sample(&self, row: u32, col: u32) -> Option<u16> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let offset = ((row as usize) * (self.width as usize) + col as usize) * 2;
        let pair = self.bytes.get(offset..offset + 2)?;
        Some(le_sample(pair))
    }

    /// Samples in row-major order.
    pub fn samples(&self) -> impl Iterator<Item = u16> + 'a {
        self.bytes.chunks_exact(2).map(le_sample)
    }

    /// Copy the samples out of the mapped buffer.
    #[must_use]
    pub fn to_samples(&self) -> Vec<u16> {
        self.samples().collect()
    }

    /// The underlying bytes, exactly one frame long.
    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

fn le_sample(pair: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(pair);
    u16::from_le_bytes(raw)
}

/// Owned height x width matrix of 8-bit display samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneMappedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ToneMappedFrame {
    /// Build a frame from row-major pixels. Returns `None` on a size mismatch.
    #[must_use]
    pub fn from_pixels(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        (data.len() == (width as usize) * (height as usize)).then_some(Self {
            data,
            width,
            height,
        })
    }

    /// One output pixel per sample of `raw`, same geometry.
    pub(crate) fn from_samples_of(raw: &RawFrameView<'_>, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), raw.len());
        Self {
            data,
            width: raw.width(),
            height: raw.height(),
        }
    }

    /// Frame width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at (`row`, `col`), or `None` outside the frame.
    #[must_use]
    pub fn pixel(&self, row: u32, col: u32) -> Option<u8> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data
            .get((row as usize) * (self.width as usize) + col as usize)
            .copied()
    }

    /// Row-major pixels.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mean pixel value, 0 for an empty frame.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.data.iter().map(|&p| u64::from(p)).sum();
        #[allow(clippy::cast_precision_loss)]
        {
            sum as f64 / self.data.len() as f64
        }
    }
}
