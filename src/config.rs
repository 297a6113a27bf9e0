//! Runtime settings
//!
//! Only the input directory comes from the command line. Everything else has a
//! built-in default that can be overridden through the environment, which is
//! how a kiosk service unit usually tweaks device paths.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

pub const VIDEO_EXTENSION: &str = "mp4";
pub const RESUME_INDEX_FILE: &str = "video-index.txt";
pub const BACKLIGHT_POWER_FILE: &str = "/sys/class/backlight/rpi_backlight/bl_power";
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const MPV_BINARY: &str = "mpv";
const MPV_SOCKET_NAME: &str = "loop-kiosk-mpv.sock";

const ENV_BACKLIGHT: &str = "LOOP_KIOSK_BACKLIGHT";
const ENV_MPV: &str = "LOOP_KIOSK_MPV";
const ENV_INDEX_FILE: &str = "LOOP_KIOSK_INDEX_FILE";

/// Looping video player for kiosk displays
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Main folder containing the video files
    #[arg(short, long)]
    pub input: PathBuf,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub extension: String,
    pub resume_file: PathBuf,
    pub backlight_path: PathBuf,
    pub poll_interval: Duration,
    pub mpv_binary: PathBuf,
    pub mpv_socket: PathBuf,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Self {
        Self::with_overrides(cli.input, |key| std::env::var_os(key).map(PathBuf::from))
    }

    /// Builds settings for `input_dir`, asking `lookup` for each overridable
    /// path before falling back to the default.
    pub fn with_overrides<F>(input_dir: PathBuf, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        Self {
            input_dir,
            extension: VIDEO_EXTENSION.to_string(),
            resume_file: lookup(ENV_INDEX_FILE).unwrap_or_else(|| PathBuf::from(RESUME_INDEX_FILE)),
            backlight_path: lookup(ENV_BACKLIGHT)
                .unwrap_or_else(|| PathBuf::from(BACKLIGHT_POWER_FILE)),
            poll_interval: POLL_INTERVAL,
            mpv_binary: lookup(ENV_MPV).unwrap_or_else(|| PathBuf::from(MPV_BINARY)),
            mpv_socket: std::env::temp_dir().join(MPV_SOCKET_NAME),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}
