//! Boson-capture binary: stream, tone-map and optionally record a thermal camera.

use std::path::PathBuf;

use boson_capture::{
    CaptureConfig, CaptureDevice, CaptureLoop, DeviceSession, FileConfig, Format, FrameLimit,
    HeadlessDisplay, QuitSignal, TiffRecorder, V4L2Device,
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Capture RAW16 frames from a V4L2 thermal camera.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Video device index, opens /dev/video<N>.
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=9))]
    device: Option<u32>,

    /// Record raw and AGC frames as TIFF into folder NAME.
    #[arg(short = 'f', long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
    record: Option<String>,

    /// Stop after N recorded frames (0 = unlimited).
    #[arg(short = 't', long, value_name = "N")]
    frames: Option<u64>,

    /// TOML file with a [capture] table.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    /// File values first, then flags on top.
    fn resolve(self) -> boson_capture::traits::Result<CaptureConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::from_file(path)?.capture,
            None => CaptureConfig::default(),
        };
        if let Some(index) = self.device {
            config.device_index = index;
        }
        if let Some(frames) = self.frames {
            config.frame_limit = frames;
        }
        if let Some(name) = self.record {
            config = config.record_into(&name)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> boson_capture::traits::Result<()> {
    let config = cli.resolve()?;

    let quit = QuitSignal::new();
    quit.install_ctrlc()?;

    let mut recorder = if config.record {
        Some(TiffRecorder::create(config.output_path())?)
    } else {
        None
    };
    if recorder.is_none() && config.frame_limit > 0 {
        warn!(
            frames = config.frame_limit,
            "frame limit has no effect without --record, stop with Ctrl-C"
        );
    }

    let device = V4L2Device::open(config.device_index)?;
    info!(
        path = device.path(),
        card = %device.capabilities().card,
        "opened camera"
    );
    let session = DeviceSession::start(device, &Format::BOSON_640)?;

    let mut display = HeadlessDisplay::new(quit);
    let mut capture =
        CaptureLoop::new(&mut display).with_limit(FrameLimit::new(config.frame_limit));
    if let Some(recorder) = recorder.as_mut() {
        capture = capture.with_recorder(recorder);
    }

    capture.run(session)?;
    Ok(())
}
