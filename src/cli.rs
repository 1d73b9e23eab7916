use clap::Parser;
use std::path::PathBuf;

use crate::core::dirty::SyncPolicy;
use crate::core::orchestrator::{MAX_STREAMS, ViewerConfig};
use crate::core::slot::LoopMode;
use crate::help::KEYS_HELP;

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  playa-ffmpeg 8.0 (static)\n",
    "UI:     eframe 0.33\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Synchronized grid viewer for several video streams
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None, after_help = KEYS_HELP)]
pub struct Args {
    /// Video files or URLs, one grid cell each (max 16)
    #[arg(value_name = "SOURCE", required = true, num_args = 1..=MAX_STREAMS)]
    pub sources: Vec<String>,

    /// Start playing immediately instead of paused
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Enable looping (default: true)
    #[arg(short = 'o', long = "loop", value_name = "0|1", default_value = "1")]
    pub loop_playback: u8,

    /// Composite only when every stream has a new frame
    #[arg(long = "lockstep")]
    pub lockstep: bool,

    /// Start in fullscreen mode
    #[arg(short = 'F', long = "fullscreen")]
    pub fullscreen: bool,

    /// Initial window width
    #[arg(long = "width", value_name = "PX", default_value_t = 1920)]
    pub width: u32,

    /// Initial window height
    #[arg(long = "height", value_name = "PX", default_value_t = 1080)]
    pub height: u32,

    /// Enable debug logging to file (default: gridplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// Window setup derived from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Args {
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            autoplay: self.autoplay,
            loop_mode: if self.loop_playback != 0 {
                LoopMode::Infinite
            } else {
                LoopMode::Once
            },
            sync: if self.lockstep {
                SyncPolicy::Lockstep
            } else {
                SyncPolicy::Eager
            },
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            width: self.width.max(1),
            height: self.height.max(1),
            fullscreen: self.fullscreen,
        }
    }

    /// Log file path if `-l` was given.
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|p| p.clone().unwrap_or_else(|| PathBuf::from("gridplay.log")))
    }
}
