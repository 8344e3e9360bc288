//! TIFF recording of raw and tone-mapped frames.
//!
//! Layout under the output root:
//!
//! ```text
//! <root>/raw/<index>.tiff   16-bit greyscale, samples as captured
//! <root>/agc/<index>.tiff   8-bit greyscale, linear AGC output
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use tracing::{debug, info};

use crate::frame::{RawFrameView, ToneMappedFrame};
use crate::traits::{CameraError, FrameRecorder, Result};

/// File extension of every artifact.
pub const ARTIFACT_EXTENSION: &str = "tiff";

/// Which matrix of a frame an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Captured 16-bit samples.
    Raw,
    /// Tone-mapped 8-bit samples.
    Agc,
}

impl ArtifactKind {
    /// Subdirectory name under the output root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Agc => "agc",
        }
    }
}

/// Path of artifact `kind` for frame `index` under `root`.
#[must_use]
pub fn artifact_path(root: &Path, kind: ArtifactKind, index: u64) -> PathBuf {
    root.join(kind.dir_name())
        .join(format!("{index}.{ARTIFACT_EXTENSION}"))
}

/// Writes each frame as a pair of TIFF files.
#[derive(Debug)]
pub struct TiffRecorder {
    root: PathBuf,
}

impl TiffRecorder {
    /// Create `root`, `root/raw` and `root/agc` if missing.
    pub fn create<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        for kind in [ArtifactKind::Raw, ArtifactKind::Agc] {
            fs::create_dir_all(root.join(kind.dir_name()))?;
        }
        info!(folder = %root.display(), "recording enabled");
        Ok(Self { root })
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn record_error<R: ToString>(path: &Path, reason: R) -> CameraError {
    CameraError::Record {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

impl FrameRecorder for TiffRecorder {
    fn record(&mut self, raw: &RawFrameView<'_>, agc: &ToneMappedFrame, index: u64) -> Result<()> {
        let raw_path = artifact_path(&self.root, ArtifactKind::Raw, index);
        let raw_image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(raw.width(), raw.height(), raw.to_samples())
                .ok_or_else(|| record_error(&raw_path, "sample count does not match geometry"))?;
        raw_image
            .save_with_format(&raw_path, ImageFormat::Tiff)
            .map_err(|err| record_error(&raw_path, err))?;

        let agc_path = artifact_path(&self.root, ArtifactKind::Agc, index);
        let agc_image = GrayImage::from_raw(agc.width(), agc.height(), agc.as_bytes().to_vec())
            .ok_or_else(|| record_error(&agc_path, "pixel count does not match geometry"))?;
        agc_image
            .save_with_format(&agc_path, ImageFormat::Tiff)
            .map_err(|err| record_error(&agc_path, err))?;

        debug!(index, "frame recorded");
        Ok(())
    }
}
