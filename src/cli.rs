//! Command-line interface for voxdrive
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Stream speech to a recognition service and drive a robot over a serial
/// line.
#[derive(Parser, Debug)]
#[command(
    name = "voxdrive",
    version,
    about = "Stream speech to a recognition service and drive a robot over a serial line"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Serial port the robot is attached to (e.g. /dev/ttyUSB0)
    pub port: Option<String>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress result output (commands are still dispatched)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: streaming summary)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (see `voxdrive devices`)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Stream a WAV file instead of the microphone
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Recognition service endpoint (ws:// or wss:// URL)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Audio sample rate in Hz
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Recognition language (BCP-47 tag, e.g. en-US, sl-SI)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Session length cap (e.g. 30s, 5m, 1h30m; default 10m)
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub duration: Option<Duration>,
}

/// Parse a duration argument: bare numbers (seconds) or any `humantime`
/// format (`30s`, `5m`, `1h30m`).
fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    crate::config::parse_duration(s)
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Show the command grammar (phrase → robot command table)
    Grammar,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
