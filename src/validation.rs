//! Frame validation utilities for tone-mapping and test pattern verification.
//!
//! These checks work on any source, so the same assertions run against the
//! mock device in unit tests and against vivid or a real sensor in
//! integration tests.

use crate::agc::{FrameStats, OUTPUT_MAX};
use crate::frame::{RawFrameView, ToneMappedFrame};
use crate::traits::{CameraError, Result};

/// Minimum tone-mapped rise across the centre row for a ramp to count.
const MIN_RAMP_RISE: u8 = 200;

/// Validates that `agc` is the linear min-max stretch of `raw`.
///
/// Checks geometry, that the coldest samples map to 0 and the hottest to
/// 255, and that ordering between samples is preserved. A flat raw frame
/// must map to all zeros.
///
/// # Arguments
///
/// * `raw` - The captured 16-bit frame
/// * `agc` - The tone-mapped frame produced from it
///
/// # Errors
///
/// Returns `Validation` if:
/// - The dimensions differ
/// - Any extreme does not land on 0 or 255
/// - A brighter raw sample maps to a darker output value
pub fn validate_stretch(raw: &RawFrameView<'_>, agc: &ToneMappedFrame) -> Result<()> {
    if (raw.width(), raw.height()) != (agc.width(), agc.height()) {
        return Err(CameraError::Validation(format!(
            "geometry mismatch: raw {}x{}, agc {}x{}",
            raw.width(),
            raw.height(),
            agc.width(),
            agc.height()
        )));
    }

    let stats = FrameStats::scan(raw);
    let mut brightest_below: Option<(u16, u8)> = None;

    for (i, (value, &out)) in raw.samples().zip(agc.as_bytes()).enumerate() {
        if stats.is_flat() {
            if out != 0 {
                return Err(CameraError::Validation(format!(
                    "flat frame produced {out} at sample {i}"
                )));
            }
            continue;
        }
        if value == stats.min && out != 0 {
            return Err(CameraError::Validation(format!(
                "minimum {value} mapped to {out} at sample {i}"
            )));
        }
        if value == stats.max && u32::from(out) != OUTPUT_MAX {
            return Err(CameraError::Validation(format!(
                "maximum {value} mapped to {out} at sample {i}"
            )));
        }
        if out != stats.stretch(value) {
            return Err(CameraError::Validation(format!(
                "sample {i}: {value} mapped to {out}, expected {}",
                stats.stretch(value)
            )));
        }
        if let Some((prev_value, prev_out)) = brightest_below {
            if value > prev_value && out < prev_out {
                return Err(CameraError::Validation(format!(
                    "ordering broken at sample {i}: {value}->{out} after {prev_value}->{prev_out}"
                )));
            }
        }
        brightest_below = Some((value, out));
    }

    Ok(())
}

/// Validates that a tone-mapped frame contains a horizontal ramp.
///
/// Samples the centre row every 10 pixels and verifies that brightness never
/// drops by more than one level, and that it rises by at least
/// [`MIN_RAMP_RISE`] overall.
///
/// # Errors
///
/// Returns `Validation` if:
/// - The frame is empty
/// - The centre row decreases
/// - The total rise is too small (solid frame)
pub fn validate_ramp(agc: &ToneMappedFrame) -> Result<()> {
    let row = agc.height() / 2;
    let sample_step = 10usize;

    let levels: Vec<u8> = (0..agc.width())
        .step_by(sample_step)
        .filter_map(|col| agc.pixel(row, col))
        .collect();

    let (Some(&first), Some(&last)) = (levels.first(), levels.last()) else {
        return Err(CameraError::Validation(
            "cannot validate ramp on empty frame".to_owned(),
        ));
    };

    for pair in levels.windows(2) {
        if let [prev, next] = pair {
            if next.saturating_add(1) < *prev {
                return Err(CameraError::Validation(format!(
                    "ramp not monotonically increasing on row {row}: {next} < previous {prev}"
                )));
            }
        }
    }

    let rise = last.saturating_sub(first);
    if rise < MIN_RAMP_RISE {
        return Err(CameraError::Validation(format!(
            "insufficient rise for ramp: {rise} (expected at least {MIN_RAMP_RISE})"
        )));
    }

    Ok(())
}

/// Validates that recorded frame indices run 0, 1, 2, ... without gaps.
///
/// # Errors
///
/// Returns `Validation` if the slice is empty or any index is out of place.
pub fn validate_index_sequence(indices: &[u64]) -> Result<()> {
    if indices.is_empty() {
        return Err(CameraError::Validation(
            "cannot validate empty index sequence".to_owned(),
        ));
    }

    for (expected, &actual) in (0u64..).zip(indices) {
        if actual != expected {
            return Err(CameraError::Validation(format!(
                "index gap: expected {expected}, got {actual}"
            )));
        }
    }

    Ok(())
}
