//! Linear min-max AGC: RAW16 to 8-bit display samples.
//!
//! Two passes over the frame. The first finds the sample range, the second
//! stretches every sample onto `0..=255` with
//! `floor(255 * (v - min) / (max - min))`. A flat frame (`max == min`) has no
//! range to stretch and maps to all zeros.

use crate::frame::{RawFrameView, ToneMappedFrame};

/// Largest output value.
pub const OUTPUT_MAX: u32 = 255;

/// Sample range of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Smallest sample.
    pub min: u16,
    /// Largest sample.
    pub max: u16,
}

impl FrameStats {
    /// First pass: scan every sample for the minimum and maximum.
    ///
    /// Starts from `min = u16::MAX`, `max = 0` so any real sample updates both.
    #[must_use]
    pub fn scan(raw: &RawFrameView<'_>) -> Self {
        raw.samples().fold(
            Self {
                min: u16::MAX,
                max: 0,
            },
            |stats, v| Self {
                min: stats.min.min(v),
                max: stats.max.max(v),
            },
        )
    }

    /// No spread between min and max (also true for an empty frame).
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.max <= self.min
    }

    /// `max - min`, 0 when flat.
    #[must_use]
    pub const fn span(&self) -> u16 {
        self.max.saturating_sub(self.min)
    }

    /// Map one sample into `0..=255`. Samples outside the range are clamped.
    #[must_use]
    pub fn stretch(&self, v: u16) -> u8 {
        if self.is_flat() {
            return 0;
        }
        let span = u32::from(self.span());
        let offset = u32::from(v.saturating_sub(self.min)).min(span);
        // 255 * 65535 fits in u32.
        u8::try_from(OUTPUT_MAX * offset / span).unwrap_or(u8::MAX)
    }
}

/// Tone-map a raw frame with its own range.
#[must_use]
pub fn linear_stretch(raw: &RawFrameView<'_>) -> ToneMappedFrame {
    stretch_with(raw, FrameStats::scan(raw))
}

/// Second pass: stretch `raw` using precomputed `stats`.
#[must_use]
pub fn stretch_with(raw: &RawFrameView<'_>, stats: FrameStats) -> ToneMappedFrame {
    let pixels: Vec<u8> = raw.samples().map(|v| stats.stretch(v)).collect();
    // A view always yields exactly width * height samples.
    ToneMappedFrame::from_samples_of(raw, pixels)
}
