//! Resolved run options and their optional TOML file form.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Folder used when recording without an explicit name.
pub const DEFAULT_SENSOR_NAME: &str = "Boson_640";

/// Longest accepted folder name, in bytes.
pub const MAX_FOLDER_NAME_LEN: usize = 255;

/// Options the capture run needs, already resolved from CLI and file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Opens `/dev/video<device_index>`.
    pub device_index: u32,
    /// Write raw and AGC TIFFs for every frame.
    pub record: bool,
    /// Root folder for recorded frames.
    pub output_root: String,
    /// Recorded frames after which to stop; 0 means unlimited.
    pub frame_limit: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            record: false,
            output_root: DEFAULT_SENSOR_NAME.to_owned(),
            frame_limit: 0,
        }
    }
}

impl CaptureConfig {
    /// Device node for the configured index.
    #[must_use]
    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.device_index)
    }

    /// Output root as a path.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_root)
    }

    /// Enable recording into the folder named by `fragment`.
    ///
    /// Names shorter than two characters fall back to [`DEFAULT_SENSOR_NAME`].
    pub fn record_into(mut self, fragment: &str) -> Result<Self, ConfigError> {
        self.record = true;
        self.output_root = resolve_folder_name(fragment)?;
        Ok(self)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_folder_name(&self.output_root)
    }
}

/// Turn a user-supplied folder fragment into the output root name.
pub fn resolve_folder_name(fragment: &str) -> Result<String, ConfigError> {
    if fragment.chars().count() < 2 {
        return Ok(DEFAULT_SENSOR_NAME.to_owned());
    }
    validate_folder_name(fragment)?;
    Ok(fragment.to_owned())
}

/// Reject names that are not a single plain directory component.
pub fn validate_folder_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &'static str| ConfigError::InvalidFolderName {
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.len() > MAX_FOLDER_NAME_LEN {
        return Err(invalid("longer than 255 bytes"));
    }
    if name == "." || name == ".." {
        return Err(invalid("refers to a special directory"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("contains a path separator"));
    }
    if name.contains('\0') {
        return Err(invalid("contains a NUL byte"));
    }
    Ok(())
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Folder fragment is not usable as a directory name.
    #[error("invalid folder name {name:?}: {reason}")]
    InvalidFolderName {
        /// Offending name.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// Config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// `[capture]` table.
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        Ok(config)
    }
}
